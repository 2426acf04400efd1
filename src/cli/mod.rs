mod check;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use console::style;
use tracing::info;

use crate::config::{AppConfig, Credentials, DEFAULT_CONFIG_PATH};
use crate::error::SyncError;
use crate::slack::SlackClient;
use crate::squadcast::SquadcastClient;
use crate::terminal::{self, GuideSection, print_error};
use crate::{logging, sync};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Commands")
        .command("sync", "Run a one-shot on-call to Slack sync")
        .command("check", "Validate credentials and connectivity, write nothing")
        .command("help", "Show this help message")
        .print();

    GuideSection::new("Options")
        .command("--config <path>", "Path to config.json (default: ./config.json)")
        .print();

    GuideSection::new("Environment")
        .status("SQUADCAST_REFRESH_TOKEN", "Squadcast refresh token (required)")
        .status("SQUADCAST_TEAM_ID", "Squadcast team id (required)")
        .status("SLACK_BOT_TOKEN", "Slack bot token (required)")
        .status("SQUADCAST_TENANCY", "Tenancy host suffix (default: squadcast.com)")
        .print();

    println!(
        "\n {} {} <command> [--config <path>]\n",
        style("Usage:").bold(),
        style("sq-slack-sync").green()
    );
}

pub(crate) fn parse_config_flag(args: &[String], start: usize) -> PathBuf {
    let mut path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    path = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    path
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "sync" => {
            let config_path = parse_config_flag(&args, 2);
            run_sync(&config_path).await?;
        }
        "check" => {
            let config_path = parse_config_flag(&args, 2);
            if !check::run_check(&config_path).await? {
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
        }
    }

    Ok(())
}

async fn run_sync(config_path: &Path) -> Result<(), SyncError> {
    let (config, source) = AppConfig::load(config_path);
    logging::init(&config.sync_settings.log_level, &config.sync_settings.log_file);

    info!("Squadcast Slack Sync starting");
    info!("{}", source);

    let creds = Credentials::from_env()?;
    let timeout = Duration::from_secs(config.sync_settings.timeout_seconds);

    info!("Initializing API clients");
    let squadcast = SquadcastClient::connect(
        &creds.squadcast_refresh_token,
        &creds.squadcast_team_id,
        &creds.squadcast_auth_base_url(),
        &creds.squadcast_api_base_url(),
        timeout,
    )
    .await?;
    let slack = SlackClient::new(&creds.slack_bot_token, None, timeout)?;

    let report = sync::run(&squadcast, &slack).await?;
    info!(
        "Sync completed successfully ({} schedules processed, {} skipped)",
        report.processed, report.skipped
    );
    Ok(())
}

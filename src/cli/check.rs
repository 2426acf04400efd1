use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::config::{AppConfig, Credentials};
use crate::slack::SlackClient;
use crate::squadcast::SquadcastClient;
use crate::sync::USERGROUP_TAG_KEY;
use crate::terminal::{print_error, print_status, print_step, print_success, print_warn};

fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{}...", prefix)
}

/// Preflight: verify environment, config, and connectivity to both APIs
/// without mutating anything. Returns false when any check fails.
pub async fn run_check(config_path: &Path) -> Result<bool> {
    print_step("Checking environment variables...");
    let creds = match Credentials::from_env() {
        Ok(creds) => creds,
        Err(e) => {
            print_error(&format!("{}", e));
            return Ok(false);
        }
    };
    print_success("All required environment variables are set");
    print_status("Squadcast Team ID", &creds.squadcast_team_id);
    print_status("Squadcast Tenancy", &creds.squadcast_tenancy);
    print_status("Slack Bot Token", &redact(&creds.slack_bot_token));
    print_status("Squadcast Refresh Token", &redact(&creds.squadcast_refresh_token));

    print_step("Checking configuration...");
    let (config, source) = AppConfig::load(config_path);
    print_success(&format!("{}", source));
    print_status("Log level", &config.sync_settings.log_level);
    print_status("Timeout", &format!("{}s", config.sync_settings.timeout_seconds));
    let timeout = Duration::from_secs(config.sync_settings.timeout_seconds);

    print_step("Checking Squadcast API connectivity...");
    let squadcast = match SquadcastClient::connect(
        &creds.squadcast_refresh_token,
        &creds.squadcast_team_id,
        &creds.squadcast_auth_base_url(),
        &creds.squadcast_api_base_url(),
        timeout,
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            print_error(&format!("Squadcast connection failed: {}", e));
            return Ok(false);
        }
    };
    let schedules = match squadcast.who_is_oncall().await {
        Ok(schedules) => schedules,
        Err(e) => {
            print_error(&format!("Squadcast API error: {}", e));
            return Ok(false);
        }
    };
    print_success("Squadcast API connection successful");
    print_status("Schedules found", &schedules.len().to_string());
    let tagged: Vec<&str> = schedules
        .iter()
        .filter(|s| s.schedule.tags.iter().any(|t| t.key == USERGROUP_TAG_KEY))
        .map(|s| s.schedule.name.as_str())
        .collect();
    print_status("Schedules with slack-usergroup-id tags", &tagged.len().to_string());
    for name in &tagged {
        print_status("Tagged schedule", name);
    }
    if tagged.is_empty() {
        print_warn("No schedule carries a slack-usergroup-id tag; a sync run would be a no-op");
    }

    print_step("Checking Slack API connectivity...");
    let slack = match SlackClient::new(&creds.slack_bot_token, None, timeout) {
        Ok(client) => client,
        Err(e) => {
            print_error(&format!("Slack client setup failed: {}", e));
            return Ok(false);
        }
    };
    match slack.auth_test().await {
        Ok(identity) => {
            print_success("Slack API connection successful");
            print_status("Bot user", &identity.user);
            print_status("Team", &identity.team);
        }
        Err(e) => {
            print_error(&format!("Slack API error: {}", e));
            return Ok(false);
        }
    }
    match slack.user_groups().await {
        Ok(groups) => print_status("Accessible user groups", &groups.len().to_string()),
        Err(e) => {
            print_error(&format!("Slack API error: {}", e));
            return Ok(false);
        }
    }

    print_success("All checks passed. Your setup is ready to sync.");
    Ok(true)
}

use sq_slack_sync::error::SyncError;
use sq_slack_sync::{cli, terminal};

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_main().await {
        let code = e
            .downcast_ref::<SyncError>()
            .map(SyncError::exit_code)
            .unwrap_or(3);
        tracing::error!("{}", e);
        terminal::print_error(&format!("{}", e));
        std::process::exit(code);
    }
}

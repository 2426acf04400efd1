use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize structured logging: a colorized console layer plus a plain-text
/// append-mode file layer. Called once by the CLI after the config is loaded;
/// collaborators just emit `tracing` events.
///
/// If the log file cannot be opened, logging degrades to console only.
pub fn init(level: &str, log_file: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(false);

    match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()
                .ok(); // Ignore err if a subscriber is already installed
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init()
                .ok();
            tracing::warn!("Could not open log file {}: {}. Logging to console only.", log_file, e);
        }
    }
}

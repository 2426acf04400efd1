use thiserror::Error;

use crate::slack::SlackError;
use crate::squadcast::SquadcastError;

/// Top-level error for a sync run. Every known failure class maps to exit
/// code 2; anything that escapes this type is reported as unexpected (exit 3)
/// by `main`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Squadcast(#[from] SquadcastError),
    #[error(transparent)]
    Slack(#[from] SlackError),
}

impl SyncError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) | SyncError::Squadcast(_) | SyncError::Slack(_) => 2,
        }
    }
}

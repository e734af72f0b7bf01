use thiserror::Error;

use crate::types::UserId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Another action is already in progress for participant {0}")]
    ActionInProgress(UserId),

    #[error("Participant not in roster: {0}")]
    UnknownParticipant(UserId),

    #[error("No pending action for participant {0}")]
    NoPendingAction(UserId),

    #[error("Invalid action transition for participant {user_id}: {reason}")]
    InvalidTransition { user_id: UserId, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

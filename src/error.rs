//! Error types for environment interaction and training

use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by an environment adapter
#[derive(Debug, Error)]
pub enum EnvError {
    /// Reading from or writing to the game process failed
    #[error("environment i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The game answered with something that is not a valid response
    #[error("environment protocol violation: {0}")]
    Protocol(String),

    /// The game closed its output stream
    #[error("environment closed the connection")]
    Closed,
}

/// Errors surfaced by the training components
///
/// Nothing is retried: every variant except `NumericInstability` propagates
/// to the caller of the orchestrator. `NumericInstability` is only ever
/// logged as a warning.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("persistence failed for {path:?}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("numeric instability: {0}")]
    NumericInstability(String),
}

impl TrainError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = TrainError> = std::result::Result<T, E>;

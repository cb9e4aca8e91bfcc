//! CLI error types.

use polychat_client::{ClientError, StateError};
use thiserror::Error;

/// Errors that end the program.
#[derive(Debug, Error)]
pub enum CliError {
    /// Session failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Username given on the command line is unusable.
    #[error("invalid username {0:?}: must be 3 to 15 characters")]
    InvalidUsername(String),
}

impl From<StateError> for CliError {
    fn from(err: StateError) -> Self {
        Self::Client(err.into())
    }
}

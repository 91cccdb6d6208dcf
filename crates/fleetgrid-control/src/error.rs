//! Error types for Cluster Control API calls.

use fleetgrid_state::Status;
use thiserror::Error;

/// Result type alias for cluster control calls.
pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("control API returned {code}: {body}")]
    Http { code: u16, body: String },

    #[error("malformed control API response: {0}")]
    Decode(String),

    /// The remote side answered with an `errMessage`.
    #[error("{0}")]
    Rejected(String),
}

impl ControlError {
    pub fn status(&self) -> Status {
        match self {
            ControlError::Rejected(_) => Status::DeployRejected,
            _ => Status::InternalError,
        }
    }
}

impl From<reqwest::Error> for ControlError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ControlError::Decode(e.to_string())
        } else {
            ControlError::Transport(e.to_string())
        }
    }
}

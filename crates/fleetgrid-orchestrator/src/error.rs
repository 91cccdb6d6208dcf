//! Orchestrator errors and their `Status` mapping.

use fleetgrid_control::ControlError;
use fleetgrid_state::{StateError, Status};
use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    /// Remote refusal, message passed through verbatim.
    #[error("{0}")]
    DeployRejected(String),

    #[error("namespace creation failed: {0}")]
    NamespaceCreationFailed(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("no rollback configured for container {0}")]
    RollbackNotConfigured(String),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl OrchestratorError {
    pub fn status(&self) -> Status {
        match self {
            OrchestratorError::InvalidParameter(_) => Status::InvalidParameter,
            OrchestratorError::PermissionDenied(_) => Status::PermissionDenied,
            OrchestratorError::NotFound(_) => Status::NotFound,
            OrchestratorError::InsufficientResources(_) => Status::InsufficientResources,
            OrchestratorError::DeployRejected(_) => Status::DeployRejected,
            OrchestratorError::NamespaceCreationFailed(_) => Status::NamespaceCreationFailed,
            OrchestratorError::UnsupportedPlatform(_) => Status::UnsupportedPlatform,
            OrchestratorError::RollbackNotConfigured(_) => Status::RollbackNotConfigured,
            OrchestratorError::Control(e) => e.status(),
            OrchestratorError::State(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_rejection_maps_to_deploy_rejected() {
        let err: OrchestratorError = ControlError::Rejected("quota exceeded".into()).into();
        assert_eq!(err.status(), Status::DeployRejected);
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn transport_failure_is_internal() {
        let err: OrchestratorError = ControlError::Transport("timed out".into()).into();
        assert_eq!(err.status(), Status::InternalError);
    }
}

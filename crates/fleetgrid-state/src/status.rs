//! Outcome vocabulary shared by every orchestration operation.

use serde::{Deserialize, Serialize};

/// The status half of the `(status, body)` pair each operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    InvalidParameter,
    PermissionDenied,
    NotFound,
    Conflict,
    InsufficientResources,
    DeployRejected,
    NamespaceCreationFailed,
    UnsupportedPlatform,
    RollbackNotConfigured,
    InternalError,
}

impl Status {
    /// Whether the caller should fix the request rather than retry later.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            Status::InvalidParameter
                | Status::PermissionDenied
                | Status::NotFound
                | Status::Conflict
                | Status::UnsupportedPlatform
                | Status::RollbackNotConfigured
                | Status::DeployRejected
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::InvalidParameter => "invalid_parameter",
            Status::PermissionDenied => "permission_denied",
            Status::NotFound => "not_found",
            Status::Conflict => "conflict",
            Status::InsufficientResources => "insufficient_resources",
            Status::DeployRejected => "deploy_rejected",
            Status::NamespaceCreationFailed => "namespace_creation_failed",
            Status::UnsupportedPlatform => "unsupported_platform",
            Status::RollbackNotConfigured => "rollback_not_configured",
            Status::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! JSON envelope and the single `Status` → HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fleetgrid_orchestrator::OrchestratorError;
use fleetgrid_registry::RegistryError;
use fleetgrid_state::Status;

use crate::auth::AuthError;

/// Response wrapper for consistent API format.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            status: Status::Ok,
            data: Some(data),
            error: None,
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// HTTP status for each outcome.
pub fn http_status(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::InvalidParameter => StatusCode::BAD_REQUEST,
        Status::PermissionDenied => StatusCode::FORBIDDEN,
        Status::NotFound => StatusCode::NOT_FOUND,
        Status::Conflict => StatusCode::CONFLICT,
        Status::InsufficientResources => StatusCode::SERVICE_UNAVAILABLE,
        Status::DeployRejected => StatusCode::BAD_REQUEST,
        Status::NamespaceCreationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        Status::UnsupportedPlatform => StatusCode::UNPROCESSABLE_ENTITY,
        Status::RollbackNotConfigured => StatusCode::PRECONDITION_FAILED,
        Status::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A failed request.
#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub status: Status,
    pub message: String,
}

impl ApiError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            code: http_status(status),
            status,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidParameter, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = ApiResponse::<()> {
            success: false,
            status: self.status,
            data: None,
            error: Some(self.message),
        };
        (self.code, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self::new(e.status(), e.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        Self::new(e.status(), e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let (code, status) = match e {
            AuthError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, Status::InternalError),
            _ => (StatusCode::UNAUTHORIZED, Status::PermissionDenied),
        };
        Self {
            code,
            status,
            message: e.to_string(),
        }
    }
}

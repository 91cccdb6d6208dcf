//! Header authentication and request-body extractors.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use fleetgrid_orchestrator::Caller;
use fleetgrid_state::Status;

use crate::ApiState;
use crate::auth::AuthError;
use crate::error::ApiError;

const TOKEN_NAME: &str = "tokenname";
const AUTH_TOKEN: &str = "authtoken";

/// A request whose `tokenName`/`authToken` headers verified.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token_name: String,
}

impl FromRequestParts<ApiState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let (Some(token_name), Some(auth_token)) = (header(TOKEN_NAME), header(AUTH_TOKEN)) else {
            return Err(AuthError::MissingHeaders.into());
        };

        state.auth.verify(&token_name, &auth_token).await?;
        Ok(Self { token_name })
    }
}

impl Authenticated {
    /// The tenant a request acts for: the user behind `email` when given,
    /// otherwise the API token itself.
    pub async fn caller(&self, state: &ApiState, email: Option<&str>) -> Result<Caller, ApiError> {
        let Some(email) = email.filter(|e| !e.is_empty()) else {
            return Ok(Caller::token(&self.token_name));
        };
        match state.auth.resolve_email(email).await? {
            Some(user_id) => Ok(Caller::user(&user_id, email)),
            None => Err(ApiError::new(
                Status::InvalidParameter,
                format!("no user registered for {email}"),
            )),
        }
    }
}

/// JSON body whose rejections use the API envelope as `InvalidParameter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid(rejection.body_text())),
        }
    }
}

/// Query string counterpart of [`JsonBody`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid(rejection.body_text())),
        }
    }
}

//! Request authentication.
//!
//! Every request carries `tokenName` and `authToken` headers. The token is
//! an HS256 JWT signed with the key registered for that token name.
//! Email-scoped requests additionally resolve the caller's email to an
//! internal user id.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing tokenName or authToken header")]
    MissingHeaders,

    #[error("token {0} is not registered")]
    UnknownToken(String),

    #[error("token is malformed")]
    Malformed,

    #[error("auth backend error: {0}")]
    Backend(String),
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub token_name: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check `auth_token` against the key registered for `token_name`.
    async fn verify(&self, token_name: &str, auth_token: &str) -> AuthResult<()>;

    /// Internal user id for `email`, if the user exists.
    async fn resolve_email(&self, email: &str) -> AuthResult<Option<String>>;
}

/// Authenticator backed by static key and user tables.
#[derive(Debug, Clone, Default)]
pub struct KeyringAuthenticator {
    /// Token name → HS256 signing key.
    api_keys: HashMap<String, String>,
    /// Email → user id.
    users: HashMap<String, String>,
}

impl KeyringAuthenticator {
    pub fn new(api_keys: HashMap<String, String>, users: HashMap<String, String>) -> Self {
        Self { api_keys, users }
    }

    /// Sign a token for `token_name` with its registered key.
    pub fn issue(&self, token_name: &str) -> AuthResult<String> {
        let key = self
            .api_keys
            .get(token_name)
            .ok_or_else(|| AuthError::UnknownToken(token_name.to_string()))?;
        let claims = Claims {
            token_name: token_name.to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .map_err(|e| AuthError::Backend(e.to_string()))
    }
}

#[async_trait]
impl Authenticator for KeyringAuthenticator {
    async fn verify(&self, token_name: &str, auth_token: &str) -> AuthResult<()> {
        let key = self
            .api_keys
            .get(token_name)
            .ok_or_else(|| AuthError::UnknownToken(token_name.to_string()))?;

        // Tokens are long-lived and carry no expiry.
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = decode::<Claims>(auth_token, &DecodingKey::from_secret(key.as_bytes()), &validation)
            .map_err(|e| {
                debug!(%token_name, error = %e, "JWT validation failed");
                AuthError::Malformed
            })?;
        if data.claims.token_name != token_name {
            debug!(%token_name, claimed = %data.claims.token_name, "token name mismatch");
            return Err(AuthError::Malformed);
        }
        Ok(())
    }

    async fn resolve_email(&self, email: &str) -> AuthResult<Option<String>> {
        Ok(self.users.get(email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyring() -> KeyringAuthenticator {
        KeyringAuthenticator::new(
            HashMap::from([
                ("ci".to_string(), "ci-secret".to_string()),
                ("ops".to_string(), "ops-secret".to_string()),
            ]),
            HashMap::from([("alice@example.com".to_string(), "u-alice".to_string())]),
        )
    }

    #[tokio::test]
    async fn issued_token_verifies() {
        let auth = keyring();
        let token = auth.issue("ci").unwrap();
        auth.verify("ci", &token).await.unwrap();
    }

    #[tokio::test]
    async fn token_for_other_name_is_rejected() {
        let auth = keyring();
        let token = auth.issue("ops").unwrap();
        assert!(matches!(auth.verify("ci", &token).await, Err(AuthError::Malformed)));
    }

    #[tokio::test]
    async fn unknown_token_name() {
        let auth = keyring();
        assert!(matches!(
            auth.verify("nobody", "x.y.z").await,
            Err(AuthError::UnknownToken(_))
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let auth = keyring();
        assert!(matches!(auth.verify("ci", "garbage").await, Err(AuthError::Malformed)));
    }

    #[tokio::test]
    async fn email_resolution() {
        let auth = keyring();
        assert_eq!(
            auth.resolve_email("alice@example.com").await.unwrap().as_deref(),
            Some("u-alice")
        );
        assert!(auth.resolve_email("eve@example.com").await.unwrap().is_none());
    }
}

//! HS256 session tokens.
//!
//! A token is issued at login and carried either in the `session` cookie or
//! an `Authorization: Bearer` header. The claims name the user, but the
//! extractor still confirms the user exists before trusting the role.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::models::users::{self, Roles};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// The user's UUID.
    pub sub: Uuid,
    pub username: String,
    pub role: Roles,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to sign session token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("Invalid session token: {0:?}")]
    Invalid(jsonwebtoken::errors::ErrorKind),
}

pub fn issue_token(user: &users::Model, config: &SessionConfig) -> Result<String, SessionError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        iat: now,
        exp: now + config.ttl_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(SessionError::Signing)
}

/// Check the signature and expiry of `token` and return its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, SessionError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| SessionError::Invalid(e.into_kind()))
}

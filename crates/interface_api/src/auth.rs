//! Authentication and authorization
//!
//! Tokens are HS256 JWTs carrying the user id, roles and permission
//! strings. The auth middleware turns a valid token into a [`Caller`] that
//! handlers receive explicitly; [`authorize`] is the single permission gate.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use core_kernel::{Caller, Permission, UserId};

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Permission strings such as `view-billing`
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a user id")]
    InvalidSubject,
}

impl From<AuthError> for ApiError {
    fn from(_: AuthError) -> Self {
        ApiError::Unauthorized
    }
}

/// Creates a signed token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `roles` - User's roles
/// * `permissions` - Permission strings granted to the user
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: UserId,
    roles: Vec<String>,
    permissions: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.as_uuid().to_string(),
        roles,
        permissions,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Builds the request caller from validated claims
pub fn caller_from_claims(claims: &Claims) -> Result<Caller, AuthError> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;
    Ok(Caller::new(
        UserId::from_uuid(user_id),
        claims.roles.iter().cloned(),
        claims.permissions.iter(),
    ))
}

/// Fails with 403 unless the caller holds `permission`; refusals are audited
pub fn authorize(caller: &Caller, permission: Permission) -> Result<(), ApiError> {
    caller.require(permission).map_err(|e| {
        warn!(
            user = %caller.user_id,
            permission = %permission,
            "permission denied"
        );
        ApiError::from(e)
    })
}

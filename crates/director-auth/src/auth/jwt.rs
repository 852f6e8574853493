use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AuthError;
use crate::models::user;

pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub username: String,
    pub role: String,
    /// Always `"access"`
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<i32, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("Invalid user ID in token".to_string()))
    }
}

/// Sign an HS256 access token for `user`, valid for `ttl`.
pub fn issue_access_token(
    user: &user::Model,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("Failed to create token: {}", e)))
}

/// Verify an access token and return its claims.
///
/// Expiry is checked with zero leeway and reported as `TokenExpired`; every
/// other failure is `InvalidToken`.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken(e.to_string()),
    })?;

    if data.claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(AuthError::InvalidToken("Not an access token".to_string()));
    }

    Ok(data.claims)
}

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::auth::session;
use crate::auth::token::{generate_opaque_token, hash_token};
use crate::error::AuthError;
use crate::models::refresh_token;

/// Create a refresh token for a user. Returns the raw token string
/// (send to client; the DB stores only the hash).
pub async fn issue_refresh_token(
    db: &DatabaseConnection,
    user_id: i32,
    expiry_days: u64,
) -> Result<String, AuthError> {
    let raw_token = generate_opaque_token();
    let now = Utc::now().naive_utc();

    let model = refresh_token::ActiveModel {
        user_id: Set(user_id),
        token_hash: Set(hash_token(&raw_token)),
        expires_at: Set(now + Duration::days(expiry_days as i64)),
        created_at: Set(now),
        ..Default::default()
    };

    model.insert(db).await?;
    Ok(raw_token)
}

/// Look up a live refresh token.
///
/// The token is not consumed: it stays valid until it expires or is
/// revoked.
pub async fn verify_refresh_token(
    db: &DatabaseConnection,
    raw_token: &str,
) -> Result<refresh_token::Model, AuthError> {
    let now = Utc::now().naive_utc();

    refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .filter(refresh_token::Column::ExpiresAt.gt(now))
        .one(db)
        .await?
        .ok_or(AuthError::InvalidOrExpiredToken)
}

/// Delete a single refresh token. Returns how many rows went away (0 or 1).
pub async fn revoke_refresh_token(db: &DatabaseConnection, raw_token: &str) -> Result<u64, AuthError> {
    let result = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Delete a refresh token only if it belongs to `user_id`.
pub async fn revoke_user_refresh_token(
    db: &DatabaseConnection,
    user_id: i32,
    raw_token: &str,
) -> Result<u64, AuthError> {
    let result = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(raw_token)))
        .filter(refresh_token::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Counts removed by [`revoke_all_user_tokens`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revoked {
    pub refresh_tokens: u64,
    pub sessions: u64,
}

/// Revoke every refresh token and every session of a user (logout
/// everywhere / password reset).
pub async fn revoke_all_user_tokens(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Revoked, AuthError> {
    let tokens = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    let sessions = session::revoke_all_user_sessions(db, user_id).await?;

    Ok(Revoked {
        refresh_tokens: tokens.rows_affected,
        sessions,
    })
}

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};

use crate::auth::token::{generate_opaque_token, hash_token};
use crate::error::AuthError;
use crate::models::session;

/// A freshly created session. `token` is the only copy of the raw secret.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub token: String,
    pub expires_at: NaiveDateTime,
}

/// Create a session record for a user.
pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i32,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timeout_secs: u64,
) -> Result<NewSession, AuthError> {
    let raw_token = generate_opaque_token();
    let session_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires_at = now + Duration::seconds(timeout_secs as i64);

    let model = session::ActiveModel {
        id: Set(session_id.clone()),
        user_id: Set(user_id),
        token_hash: Set(hash_token(&raw_token)),
        ip_address: Set(ip_address),
        user_agent: Set(user_agent),
        expires_at: Set(expires_at),
        created_at: Set(now),
    };

    model.insert(db).await?;

    Ok(NewSession {
        session_id,
        token: raw_token,
        expires_at,
    })
}

/// Resolve a session token to a live session.
pub async fn verify_session(
    db: &DatabaseConnection,
    raw_token: &str,
) -> Result<session::Model, AuthError> {
    let now = Utc::now().naive_utc();

    session::Entity::find()
        .filter(session::Column::TokenHash.eq(hash_token(raw_token)))
        .filter(session::Column::ExpiresAt.gt(now))
        .one(db)
        .await?
        .ok_or(AuthError::InvalidSession)
}

/// Push a live session's expiry to `now + timeout`.
///
/// Single conditional UPDATE: a session that has already expired is left
/// alone and reported as `SessionNotFound`.
pub async fn extend_session(
    db: &DatabaseConnection,
    raw_token: &str,
    timeout_secs: u64,
) -> Result<NaiveDateTime, AuthError> {
    let now = Utc::now().naive_utc();
    let expires_at = now + Duration::seconds(timeout_secs as i64);

    let result = session::Entity::update_many()
        .col_expr(session::Column::ExpiresAt, Expr::value(expires_at))
        .filter(session::Column::TokenHash.eq(hash_token(raw_token)))
        .filter(session::Column::ExpiresAt.gt(now))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AuthError::SessionNotFound);
    }
    Ok(expires_at)
}

/// Revoke a specific session (logout).
pub async fn revoke_session(db: &DatabaseConnection, raw_token: &str) -> Result<u64, AuthError> {
    let result = session::Entity::delete_many()
        .filter(session::Column::TokenHash.eq(hash_token(raw_token)))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Revoke all sessions for a user (logout everywhere).
pub async fn revoke_all_user_sessions(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<u64, AuthError> {
    let result = session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

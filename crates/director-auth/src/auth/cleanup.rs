use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::Expr};
use tokio::task::JoinHandle;

use crate::auth::rate_limit::RateLimiter;
use crate::error::AuthError;
use crate::models::{refresh_token, session, user};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub refresh_tokens: u64,
    pub sessions: u64,
    pub reset_tokens: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.refresh_tokens + self.sessions + self.reset_tokens
    }
}

/// Delete expired refresh tokens and sessions and clear lapsed password
/// reset tokens.
///
/// Every statement only touches rows already past expiry, so a sweep can
/// run at any time alongside request traffic and repeated sweeps are
/// no-ops.
pub async fn cleanup_expired_tokens(db: &DatabaseConnection) -> Result<CleanupReport, AuthError> {
    let now = Utc::now().naive_utc();

    let refresh_tokens = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?
        .rows_affected;

    let sessions = session::Entity::delete_many()
        .filter(session::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?
        .rows_affected;

    let reset_tokens = user::Entity::update_many()
        .col_expr(user::Column::ResetToken, Expr::value(Option::<String>::None))
        .col_expr(
            user::Column::ResetTokenExpires,
            Expr::value(Option::<NaiveDateTime>::None),
        )
        .filter(user::Column::ResetToken.is_not_null())
        .filter(user::Column::ResetTokenExpires.lte(now))
        .exec(db)
        .await?
        .rows_affected;

    Ok(CleanupReport {
        refresh_tokens,
        sessions,
        reset_tokens,
    })
}

/// Spawn the periodic maintenance loop: token sweep plus rate-limiter
/// cleanup. Abort the returned handle to stop it.
pub fn spawn_maintenance_task(
    db: DatabaseConnection,
    rate_limiter: Arc<dyn RateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            match cleanup_expired_tokens(&db).await {
                Ok(report) if report.total() > 0 => tracing::info!(
                    refresh_tokens = report.refresh_tokens,
                    sessions = report.sessions,
                    reset_tokens = report.reset_tokens,
                    "expired credentials removed"
                ),
                Ok(_) => tracing::debug!("no expired credentials"),
                Err(e) => tracing::error!(error = %e, "credential cleanup failed"),
            }

            rate_limiter.cleanup();
        }
    })
}

use chrono::{Duration, NaiveDateTime};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::{Expr, SimpleExpr},
};

use crate::config::SecurityConfig;
use crate::error::AuthError;
use crate::models::user;

/// `Ok(())` if the account is not locked at `now`, `AccountLocked` otherwise.
pub fn check_lockout(user_model: &user::Model, now: NaiveDateTime) -> Result<(), AuthError> {
    match user_model.locked_until {
        Some(locked_until) if locked_until > now => Err(AuthError::AccountLocked {
            retry_after_secs: (locked_until - now).num_seconds().max(1),
        }),
        _ => Ok(()),
    }
}

/// Record a failed login attempt, locking the account once the new count
/// reaches `max_login_attempts`.
///
/// The increment and the lock decision are one UPDATE evaluated against
/// the row's current values, so concurrent failures are all counted. A
/// lock that has already lapsed restarts the count at one.
pub async fn record_failed_attempt(
    db: &DatabaseConnection,
    user_id: i32,
    security: &SecurityConfig,
    now: NaiveDateTime,
) -> Result<(), AuthError> {
    let max_attempts = security.max_login_attempts.max(1) as i32;
    let lock_until = now + Duration::seconds(security.lockout_duration_secs as i64);

    let lapsed = Condition::all()
        .add(user::Column::LockedUntil.is_not_null())
        .add(user::Column::LockedUntil.lte(now));

    let attempts: SimpleExpr = Expr::case(lapsed.clone(), Expr::value(1))
        .finally(Expr::col(user::Column::FailedLoginAttempts).add(1))
        .into();

    let restarted_lock = if max_attempts <= 1 {
        Some(lock_until)
    } else {
        None
    };
    let locked_until: SimpleExpr = Expr::case(lapsed, Expr::value(restarted_lock))
        .case(
            Expr::col(user::Column::FailedLoginAttempts).gte(max_attempts - 1),
            Expr::value(Some(lock_until)),
        )
        .finally(Expr::col(user::Column::LockedUntil))
        .into();

    user::Entity::update_many()
        .col_expr(user::Column::FailedLoginAttempts, attempts)
        .col_expr(user::Column::LockedUntil, locked_until)
        .col_expr(user::Column::UpdatedAt, Expr::value(now))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Clear the failure counter and any lock, and stamp the login time.
pub async fn record_successful_login(
    db: &DatabaseConnection,
    user_id: i32,
    now: NaiveDateTime,
) -> Result<(), AuthError> {
    user::Entity::update_many()
        .col_expr(user::Column::FailedLoginAttempts, Expr::value(0))
        .col_expr(
            user::Column::LockedUntil,
            Expr::value(Option::<NaiveDateTime>::None),
        )
        .col_expr(user::Column::LastLoginAt, Expr::value(Some(now)))
        .col_expr(user::Column::UpdatedAt, Expr::value(now))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;

    Ok(())
}

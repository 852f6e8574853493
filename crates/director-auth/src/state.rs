use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{AccountNotifier, AuthService, RateLimiter, SlidingWindowLimiter};
use crate::config::Config;

/// Shared application state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// Wire the state with the default in-memory auth rate limiter.
    pub fn new(
        db: DatabaseConnection,
        config: Arc<Config>,
        notifier: Arc<dyn AccountNotifier>,
    ) -> Self {
        let rate_limiter = Arc::new(SlidingWindowLimiter::new(
            config.security.auth_rate_limit_max_requests,
            config.security.auth_rate_limit_window_secs,
        ));
        Self::with_rate_limiter(db, config, notifier, rate_limiter)
    }

    pub fn with_rate_limiter(
        db: DatabaseConnection,
        config: Arc<Config>,
        notifier: Arc<dyn AccountNotifier>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let auth = AuthService::new(db.clone(), config.clone(), notifier);
        AppState {
            db,
            config,
            auth,
            rate_limiter,
        }
    }
}

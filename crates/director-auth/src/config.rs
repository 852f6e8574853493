use std::net::IpAddr;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "director-dev-secret-change-me";

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set when ENVIRONMENT=production")]
    Missing(&'static str),
}

/// Security knobs for the auth subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Argon2 iteration count (time cost).
    pub password_hash_iterations: u32,
    /// Argon2 memory cost in KiB.
    pub password_hash_memory_kib: u32,
    /// Argon2 lanes.
    pub password_hash_parallelism: u32,

    /// Consecutive wrong passwords before the account locks.
    pub max_login_attempts: u32,
    /// How long a lock lasts.
    pub lockout_duration_secs: u64,

    pub refresh_token_expiry_days: u64,
    /// Sliding session lifetime, renewed on every authenticated use.
    pub session_timeout_secs: u64,
    pub password_reset_expiry_secs: u64,

    /// Auth-endpoint rate limit (per client IP).
    pub auth_rate_limit_window_secs: u64,
    pub auth_rate_limit_max_requests: u32,

    /// Interval of the expired token / session sweep.
    pub token_cleanup_interval_secs: u64,

    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are
    /// believed. Empty means the socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            password_hash_iterations: 2,
            password_hash_memory_kib: 19_456,
            password_hash_parallelism: 1,
            max_login_attempts: 5,
            lockout_duration_secs: 900,
            refresh_token_expiry_days: 30,
            session_timeout_secs: 86_400,
            password_reset_expiry_secs: 3600,
            auth_rate_limit_window_secs: 900,
            auth_rate_limit_max_requests: 10,
            token_cleanup_interval_secs: 3600,
            trusted_proxies: Vec::new(),
        }
    }
}

impl SecurityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let d = SecurityConfig::default();
        Ok(SecurityConfig {
            password_hash_iterations: env_or("PASSWORD_HASH_ITERATIONS", d.password_hash_iterations)?,
            password_hash_memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", d.password_hash_memory_kib)?,
            password_hash_parallelism: env_or(
                "PASSWORD_HASH_PARALLELISM",
                d.password_hash_parallelism,
            )?,
            max_login_attempts: env_or("MAX_LOGIN_ATTEMPTS", d.max_login_attempts)?,
            lockout_duration_secs: env_or("LOCKOUT_DURATION_SECS", d.lockout_duration_secs)?,
            refresh_token_expiry_days: env_or(
                "REFRESH_TOKEN_EXPIRY_DAYS",
                d.refresh_token_expiry_days,
            )?,
            session_timeout_secs: env_or("SESSION_TIMEOUT_SECS", d.session_timeout_secs)?,
            password_reset_expiry_secs: env_or(
                "PASSWORD_RESET_EXPIRY_SECS",
                d.password_reset_expiry_secs,
            )?,
            auth_rate_limit_window_secs: env_or(
                "AUTH_RATE_LIMIT_WINDOW_SECS",
                d.auth_rate_limit_window_secs,
            )?,
            auth_rate_limit_max_requests: env_or(
                "AUTH_RATE_LIMIT_MAX_REQUESTS",
                d.auth_rate_limit_max_requests,
            )?,
            token_cleanup_interval_secs: env_or(
                "TOKEN_CLEANUP_INTERVAL_SECS",
                d.token_cleanup_interval_secs,
            )?,
            trusted_proxies: match std::env::var("TRUSTED_PROXIES") {
                Ok(raw) => parse_ip_list("TRUSTED_PROXIES", &raw)?,
                Err(_) => d.trusted_proxies,
            },
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. `sqlite://director.db?mode=rwc`, `sqlite::memory:`)
    pub database_url: String,

    /// HMAC secret used to sign access tokens
    pub jwt_secret: String,

    /// Access token lifetime in seconds (default: 900)
    pub access_token_expiry_secs: u64,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 3000)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,

    /// Prefix for every API route (default: /api/v1)
    pub api_prefix: String,

    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == "production" => return Err(ConfigError::Missing("JWT_SECRET")),
            _ => DEV_JWT_SECRET.to_string(),
        };

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://director.db?mode=rwc".to_string()),
            jwt_secret,
            access_token_expiry_secs: env_or("ACCESS_TOKEN_EXPIRY_SECS", 900)?,
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", 3000)?,
            environment,
            api_prefix: std::env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
            security: SecurityConfig::from_env()?,
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Access token lifetime as a chrono duration.
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_expiry_secs as i64)
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated IP addresses; blanks are skipped.
pub fn parse_ip_list(key: &'static str, raw: &str) -> Result<Vec<IpAddr>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse().map_err(|_| ConfigError::Invalid {
                key,
                value: item.to_string(),
            })
        })
        .collect()
}

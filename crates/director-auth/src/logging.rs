//! Logging and tracing initialization.
//!
//! The level is controlled by `RUST_LOG`:
//!
//! ```bash
//! # Show request traces and SQL
//! RUST_LOG=debug director-server
//!
//! # Fine-grained control
//! RUST_LOG=director_auth=debug,tower_http=info,sqlx=warn director-server
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging with sensible defaults.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Call it once at
/// startup.
pub fn init_logging() {
    init_logging_with_format(LogFormat::Compact);
}

/// Initialize logging with the given formatter.
///
/// `Json` is meant for production log shipping; `Pretty` adds line numbers,
/// thread ids and targets for local debugging.
pub fn init_logging_with_format(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(default_filter());

    match format {
        LogFormat::Compact => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_line_number(true)
                    .with_thread_ids(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

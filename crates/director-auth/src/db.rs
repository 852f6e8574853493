use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;

/// Longer than any process will run. The pool never retires the connection.
const PINNED: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

/// Pool settings for `config`.
///
/// In-memory SQLite databases live and die with their connection, so the
/// pool is pinned to a single connection with idle timeout and max lifetime
/// pushed out of reach. Dropping it would silently swap in an empty,
/// unmigrated database.
pub fn connect_options(config: &Config) -> ConnectOptions {
    let mut opts = ConnectOptions::new(&config.database_url);

    if is_in_memory(&config.database_url) {
        opts.max_connections(1)
            .min_connections(1)
            .idle_timeout(PINNED)
            .max_lifetime(PINNED);
    } else {
        opts.max_connections(16)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800));
    }

    opts.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.is_dev());

    opts
}

/// Initialize the database connection from config.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    SeaDatabase::connect(connect_options(config)).await
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

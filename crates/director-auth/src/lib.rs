//! Authentication and session subsystem for Director of One.
//!
//! Users, refresh tokens, sessions and an audit trail live in SQLite via
//! SeaORM. Access tokens are stateless HS256 JWTs; refresh and session
//! tokens are opaque and stored as SHA-256 digests. Accounts lock after
//! repeated failed logins and unlock by wall clock.
//!
//! ```rust,ignore
//! use director_auth::App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     director_auth::init_logging();
//!     App::new().await?.run().await
//! }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod openapi;
pub mod response;
pub mod state;
pub mod testing;

pub use app::{App, build_router};
pub use config::{Config, ConfigError, SecurityConfig};
pub use error::AuthError;
pub use logging::{LogFormat, init_logging, init_logging_with_format};
pub use response::ApiResponse;
pub use state::AppState;

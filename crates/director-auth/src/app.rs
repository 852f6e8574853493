use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::cleanup::spawn_maintenance_task;
use crate::auth::{AccountNotifier, LogNotifier, RateLimiter, SlidingWindowLimiter};
use crate::config::Config;
use crate::controllers;
use crate::error::{AuthError, expose_internal_errors};
use crate::migrations::Migrator;
use crate::openapi::ApiDoc;
use crate::response::ApiResponse;
use crate::state::AppState;

const API_DOCS_PATH: &str = "/api-docs";
const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// The Director of One auth server.
pub struct App {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    notifier: Arc<dyn AccountNotifier>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl App {
    /// Create the application from environment configuration.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    /// Create the application with a given config: connects to the
    /// database and runs pending migrations.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        expose_internal_errors(config.is_dev());

        let db = crate::db::connect(&config).await?;

        tracing::info!("Running pending database migrations...");
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations complete.");

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(
            config.security.auth_rate_limit_max_requests,
            config.security.auth_rate_limit_window_secs,
        ));
        let notifier: Arc<dyn AccountNotifier> = Arc::new(LogNotifier::new(config.is_dev()));

        Ok(App {
            config: Arc::new(config),
            db,
            notifier,
            rate_limiter,
        })
    }

    /// Replace the account notifier (verification and reset tokens).
    pub fn with_notifier(mut self, notifier: Arc<dyn AccountNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the auth-endpoint rate limiter.
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Shared state for handlers and middleware.
    pub fn state(&self) -> AppState {
        AppState::with_rate_limiter(
            self.db.clone(),
            self.config.clone(),
            self.notifier.clone(),
            self.rate_limiter.clone(),
        )
    }

    /// Build the full router: API routes, health check and API docs.
    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    /// Serve until ctrl-c / SIGTERM, sweeping expired credentials in the
    /// background.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let state = self.state();

        let maintenance = spawn_maintenance_task(
            state.db.clone(),
            state.rate_limiter.clone(),
            Duration::from_secs(self.config.security.token_cleanup_interval_secs.max(1)),
        );

        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!(
            "Director of One running on http://{} (docs at {})",
            addr,
            API_DOCS_PATH
        );

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        maintenance.abort();
        served?;
        Ok(())
    }
}

/// Assemble the application router around `state`.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let prefix = config.api_prefix.trim_end_matches('/');

    let mut router = Router::new()
        .nest(
            &format!("{prefix}/auth"),
            controllers::auth::routes(state.clone()),
        )
        .nest(
            &format!("{prefix}/admin"),
            controllers::admin::routes(state.clone()),
        )
        .route("/health", get(health))
        .with_state(state)
        .merge(Scalar::with_url(API_DOCS_PATH, ApiDoc::openapi()))
        .route(
            OPENAPI_JSON_PATH,
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .layer(CorsLayer::permissive());

    // Request ids and request traces are development aids.
    if config.is_dev() {
        use tower_http::LatencyUnit;
        use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse};

        let x_request_id = axum::http::HeaderName::from_static("x-request-id");
        router = router
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                    .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(tracing::Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            );
    }

    router
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down Director of One server...");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// Liveness plus a database ping.
async fn health(State(state): State<AppState>) -> Result<ApiResponse<HealthResponse>, AuthError> {
    state.db.ping().await?;
    Ok(ApiResponse::success(HealthResponse {
        status: "ok",
        database: "ok",
    }))
}

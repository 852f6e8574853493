//! Request-level authentication for route groups.
//!
//! Each layer resolves credentials once and leaves the result in the
//! request extensions as a typed value ([`CurrentUser`], [`CurrentSession`])
//! that handlers read back through the extractors in
//! [`crate::extractors`].
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//!
//! Router::new()
//!     .route("/admin/audit-logs", get(audit_logs))
//!     .route_layer(axum::middleware::from_fn(authorize(&[Role::Admin])))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), authenticate));
//! ```

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::auth::client::ClientInfo;
use crate::auth::rate_limit::RateLimitDecision;
use crate::error::AuthError;
use crate::models::{session, user};
use crate::models::user::Role;
use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-token";
pub const SESSION_QUERY_PARAM: &str = "session_token";

/// The authenticated user of this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

/// The session the request was authenticated with (session auth only).
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: session::Model,
    /// Raw session token, needed to revoke the session.
    pub token: String,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract a session token from the `X-Session-Token` header or the
/// `session_token` query parameter.
pub fn session_token(req: &Request) -> Option<String> {
    if let Some(token) = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == SESSION_QUERY_PARAM && !value.is_empty()).then(|| value.to_string())
        })
    })
}

/// Require a valid bearer access token.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::NoToken)?;
    let user = state.auth.authenticate_bearer(token).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Attach the user when a valid bearer token is present; otherwise carry on
/// anonymously.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match state.auth.authenticate_bearer(token).await {
            Ok(user) => {
                req.extensions_mut().insert(CurrentUser(user));
            }
            Err(e) => tracing::debug!(error = %e, "optional auth ignored credentials"),
        }
    }
    next.run(req).await
}

/// Require a valid session token; slides the session expiry forward.
pub async fn session_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = session_token(&req).ok_or(AuthError::NoToken)?;
    let (user, session) = state.auth.authenticate_session(&token).await?;

    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(CurrentSession { session, token });
    Ok(next.run(req).await)
}

/// Build a middleware admitting only users whose role is in `allowed`.
///
/// Must run after [`authenticate`] or [`session_auth`].
pub fn authorize(
    allowed: &'static [Role],
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>
+ Clone
+ Send
+ Sync {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let current = req
                .extensions()
                .get::<CurrentUser>()
                .ok_or(AuthError::NoToken)?;

            let role = current.0.role();
            if !allowed.contains(&role) {
                tracing::warn!(user_id = current.0.id, role = %role, "role not permitted");
                return Err(AuthError::Forbidden(
                    "Insufficient permissions for this resource".to_string(),
                ));
            }

            Ok(next.run(req).await)
        })
    }
}

/// Per-client-IP limit for the public auth endpoints.
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = ClientInfo::from_headers(
        req.headers(),
        peer,
        &state.config.security.trusted_proxies,
    );

    match state.rate_limiter.check_and_increment(client.rate_limit_key()) {
        RateLimitDecision::Allowed { .. } => Ok(next.run(req).await),
        RateLimitDecision::Limited { retry_after_secs } => {
            tracing::warn!(
                client = client.rate_limit_key(),
                path = %req.uri().path(),
                "auth rate limit exceeded"
            );
            Err(AuthError::RateLimited { retry_after_secs })
        }
    }
}

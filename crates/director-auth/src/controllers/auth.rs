use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::ClientInfo;
use crate::auth::middleware::{auth_rate_limit, authenticate, optional_auth, session_auth};
use crate::auth::service::{ProfileUpdate, RegisterInput};
use crate::error::AuthError;
use crate::extractors::{AuthUser, Json, MaybeUser, SessionContext, ValidatedJson};
use crate::models::session::SessionResponse;
use crate::models::user::UserResponse;
use crate::response::{ApiResponse, MessageResponse};
use crate::state::AppState;

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

// ── Request / Response types ──

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email address or username
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub email_or_username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// One-time email verification token
    pub verification_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    /// Token from the verification email
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Refresh token to revoke
    pub refresh_token: Option<String>,
    /// If true, revoke every refresh token and session (logout everywhere)
    pub all_sessions: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedResponse {
    pub session_id: String,
    pub session_token: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfoResponse {
    pub user: UserResponse,
    pub session: SessionResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

// ── Routes ──

pub fn routes(state: AppState) -> Router<AppState> {
    let rate_limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit));

    let bearer = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me).put(update_me))
        .route("/change-password", post(change_password))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let session = get(session_info)
        .delete(end_session)
        .route_layer(from_fn_with_state(state.clone(), session_auth))
        .merge(post(create_session).route_layer(from_fn_with_state(state.clone(), authenticate)));

    Router::new()
        .merge(rate_limited)
        .merge(bearer)
        .route("/session", session)
        .route("/refresh", post(refresh))
        .route("/verify-email", get(verify_email))
        .route(
            "/status",
            get(status).route_layer(from_fn_with_state(state, optional_auth)),
        )
}

// ── Handlers ──

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<RegisterResponse>),
        (status = 400, description = "Invalid input or email/username taken"),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ApiResponse<RegisterResponse>), AuthError> {
    let registered = state
        .auth
        .register(
            RegisterInput {
                email: payload.email,
                username: payload.username,
                password: payload.password,
                first_name: payload.first_name,
                last_name: payload.last_name,
            },
            &client,
        )
        .await?;

    Ok(ApiResponse::created(RegisterResponse {
        user: registered.user.into(),
        access_token: registered.tokens.access_token,
        refresh_token: registered.tokens.refresh_token,
        verification_token: registered.verification_token,
    }))
}

/// Log in with email or username.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account locked or deactivated"),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AuthError> {
    let logged_in = state
        .auth
        .login(&payload.email_or_username, &payload.password, &client)
        .await?;

    Ok(ApiResponse::success(AuthResponse {
        user: logged_in.user.into(),
        access_token: logged_in.tokens.access_token,
        refresh_token: logged_in.tokens.refresh_token,
    }))
}

/// Exchange a refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<RefreshResponse>),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<ApiResponse<RefreshResponse>, AuthError> {
    let (access_token, user) = state.auth.refresh_access_token(&payload.refresh_token).await?;

    Ok(ApiResponse::success(RefreshResponse {
        access_token,
        user: user.into(),
    }))
}

/// Request a password reset. The answer is the same whether or not the
/// email is registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic confirmation", body = ApiResponse<MessageResponse>),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    state.auth.forgot_password(&payload.email, &client).await?;
    Ok(ApiResponse::success(MessageResponse::new(
        FORGOT_PASSWORD_MESSAGE,
    )))
}

/// Set a new password using a reset token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Weak password or invalid/expired token"),
        (status = 429, description = "Too many requests")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    state
        .auth
        .reset_password(&payload.token, &payload.new_password, &client)
        .await?;
    Ok(ApiResponse::success(MessageResponse::new(
        "Password has been reset. Please log in with your new password.",
    )))
}

/// Confirm an email address.
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Missing or invalid token")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    client: ClientInfo,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    let token = query.token.unwrap_or_default();
    state.auth.verify_email(&token, &client).await?;
    Ok(ApiResponse::success(MessageResponse::new(
        "Email verified successfully",
    )))
}

/// Revoke a refresh token, or every credential with `allSessions`.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body(content = LogoutRequest, description = "Optional body"),
    responses(
        (status = 200, description = "Logged out", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    body: Bytes,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    let payload: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AuthError::Validation(format!("Invalid JSON: {}", e)))?
    };

    let all_sessions = payload.all_sessions.unwrap_or(false);
    state
        .auth
        .logout(&user, payload.refresh_token.as_deref(), all_sessions, &client)
        .await?;

    let message = if all_sessions {
        "Logged out from all sessions"
    } else {
        "Logged out successfully"
    };
    Ok(ApiResponse::success(MessageResponse::new(message)))
}

/// Current user profile.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserEnvelope>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserEnvelope> {
    ApiResponse::success(UserEnvelope { user: user.into() })
}

/// Update the current user's profile.
#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserEnvelope>),
        (status = 400, description = "Invalid input or username taken"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserEnvelope>, AuthError> {
    let updated = state
        .auth
        .update_profile(
            user,
            ProfileUpdate {
                first_name: payload.first_name,
                last_name: payload.last_name,
                username: payload.username,
            },
            &client,
        )
        .await?;

    Ok(ApiResponse::success(UserEnvelope {
        user: updated.into(),
    }))
}

/// Change the password of the current user.
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Weak new password"),
        (status = 401, description = "Wrong current password")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    state
        .auth
        .change_password(
            &user,
            &payload.current_password,
            &payload.new_password,
            &client,
        )
        .await?;
    Ok(ApiResponse::success(MessageResponse::new(
        "Password changed successfully",
    )))
}

/// Open a server-side session for the bearer of an access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/session",
    responses(
        (status = 201, description = "Session opened", body = ApiResponse<SessionCreatedResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "session"
)]
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
) -> Result<(StatusCode, ApiResponse<SessionCreatedResponse>), AuthError> {
    let created = state.auth.open_session(&user, &client).await?;

    Ok(ApiResponse::created(SessionCreatedResponse {
        session_id: created.session_id,
        session_token: created.token,
        expires_at: created.expires_at,
    }))
}

/// Current session (session-token auth; extends the session).
#[utoipa::path(
    get,
    path = "/api/v1/auth/session",
    responses(
        (status = 200, description = "Session details", body = ApiResponse<SessionInfoResponse>),
        (status = 401, description = "Missing, invalid or expired session")
    ),
    security(("session_token" = [])),
    tag = "session"
)]
pub async fn session_info(ctx: SessionContext) -> ApiResponse<SessionInfoResponse> {
    ApiResponse::success(SessionInfoResponse {
        user: ctx.user.into(),
        session: ctx.session.session.into(),
    })
}

/// End the current session.
#[utoipa::path(
    delete,
    path = "/api/v1/auth/session",
    responses(
        (status = 200, description = "Session ended", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Missing, invalid or expired session")
    ),
    security(("session_token" = [])),
    tag = "session"
)]
pub async fn end_session(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    state.auth.close_session(&ctx.session.token).await?;
    Ok(ApiResponse::success(MessageResponse::new("Session ended")))
}

/// Whether the caller is authenticated; never rejects.
#[utoipa::path(
    get,
    path = "/api/v1/auth/status",
    responses(
        (status = 200, description = "Authentication status", body = ApiResponse<StatusResponse>)
    ),
    tag = "auth"
)]
pub async fn status(MaybeUser(user): MaybeUser) -> ApiResponse<StatusResponse> {
    ApiResponse::success(StatusResponse {
        authenticated: user.is_some(),
        user: user.map(Into::into),
    })
}

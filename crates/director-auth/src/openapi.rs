use utoipa::OpenApi;

use crate::controllers::admin::{self, UpdateUserRequest};
use crate::controllers::auth::{
    self, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    LogoutRequest, RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, SessionCreatedResponse, SessionInfoResponse, StatusResponse,
    UpdateProfileRequest, UserEnvelope,
};
use crate::error::{ErrorDetail, FieldError};
use crate::models::audit_log;
use crate::models::session::SessionResponse;
use crate::models::user::{Role, UserResponse};
use crate::response::MessageResponse;

/// OpenAPI document for the auth API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Director of One API",
        version = "0.1.0",
        description = "Accounts, tokens and sessions for Director of One."
    ),
    paths(
        auth::register,
        auth::login,
        auth::refresh,
        auth::forgot_password,
        auth::reset_password,
        auth::verify_email,
        auth::logout,
        auth::me,
        auth::update_me,
        auth::change_password,
        auth::create_session,
        auth::session_info,
        auth::end_session,
        auth::status,
        admin::audit_logs,
        admin::update_user,
        admin::delete_user,
    ),
    components(
        schemas(
            RegisterRequest,
            RegisterResponse,
            LoginRequest,
            AuthResponse,
            RefreshRequest,
            RefreshResponse,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            LogoutRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            UserEnvelope,
            SessionCreatedResponse,
            SessionInfoResponse,
            SessionResponse,
            StatusResponse,
            UpdateUserRequest,
            UserResponse,
            Role,
            audit_log::Model,
            MessageResponse,
            ErrorDetail,
            FieldError,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and account endpoints"),
        (name = "session", description = "Server-side sessions"),
        (name = "admin", description = "Administration (admin role)")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Register the bearer JWT and session-token security schemes.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "session_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Session-Token"))),
            );
        }
    }
}

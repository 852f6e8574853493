use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{HeaderValue, StatusCode, header};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::response::ApiResponse;

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Toggle whether 500 responses carry the underlying error message.
///
/// The application enables this in development only; everywhere else the
/// client sees a generic message and the detail goes to the log.
pub fn expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

/// Error type shared by the auth service, middleware and handlers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation errors")]
    ValidationErrors(Vec<FieldError>),

    #[error("{0}")]
    DuplicateIdentity(String),

    #[error("Invalid or expired token")]
    InvalidOneTimeToken,

    #[error("No authentication token provided")]
    NoToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid or expired refresh token")]
    InvalidOrExpiredToken,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Session not found")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Account is locked. Try again in {retry_after_secs} seconds.")]
    AccountLocked { retry_after_secs: i64 },

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests. Try again in {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_)
            | AuthError::ValidationErrors(_)
            | AuthError::DuplicateIdentity(_)
            | AuthError::InvalidOneTimeToken => StatusCode::BAD_REQUEST,
            AuthError::NoToken
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidSession
            | AuthError::SessionNotFound
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked { .. } | AuthError::AccountInactive | AuthError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) | AuthError::ValidationErrors(_) => "VALIDATION_ERROR",
            AuthError::DuplicateIdentity(_) => "DUPLICATE_IDENTITY",
            AuthError::InvalidOneTimeToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::NoToken => "NO_TOKEN",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::InvalidSession => "INVALID_SESSION",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::Internal(_) => "INTERNAL_ERROR",
            AuthError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Create a validation error with field-level details.
    pub fn validation_fields(errors: Vec<FieldError>) -> Self {
        AuthError::ValidationErrors(errors)
    }

    fn is_internal(&self) -> bool {
        matches!(self, AuthError::Internal(_) | AuthError::Database(_))
    }

    fn client_message(&self) -> String {
        match self {
            AuthError::ValidationErrors(errs) => errs
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; "),
            _ if self.is_internal() && !EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Field-level validation error.
///
/// ```json
/// {
///   "field": "password",
///   "message": "Password must contain at least one uppercase letter",
///   "code": "password_uppercase"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a new field error with a code.
    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    FieldError::with_code(field.to_string(), message, err.code.to_string())
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AuthError::ValidationErrors(fields)
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(error = %self, "request failed with internal error");
        }

        let fields = match &self {
            AuthError::ValidationErrors(errs) => Some(errs.clone()),
            _ => None,
        };
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
                fields,
            }),
        };

        let mut response = (status, axum::Json(body)).into_response();

        let retry_after = match &self {
            AuthError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            AuthError::AccountLocked { retry_after_secs } => u64::try_from(*retry_after_secs).ok(),
            _ => None,
        };
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

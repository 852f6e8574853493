use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::middleware::{CurrentSession, CurrentUser};
use crate::error::AuthError;
use crate::models::user;

/// The user resolved by the `authenticate` or `session_auth` layer.
///
/// ```rust,ignore
/// async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
///     ApiResponse::success(UserResponse::from(user))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|CurrentUser(user)| AuthUser(user.clone()))
            .ok_or(AuthError::NoToken)
    }
}

/// The user if `optional_auth` resolved one.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<CurrentUser>()
                .map(|CurrentUser(user)| user.clone()),
        ))
    }
}

/// User and session resolved by the `session_auth` layer.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: user::Model,
    pub session: CurrentSession,
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .map(|CurrentUser(user)| user.clone())
            .ok_or(AuthError::InvalidSession)?;
        let session = parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(AuthError::InvalidSession)?;

        Ok(SessionContext { user, session })
    }
}

use axum::{
    Router,
    extract::{Path, Query, State},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::ClientInfo;
use crate::auth::middleware::{authenticate, authorize};
use crate::auth::service::UserUpdate;
use crate::error::AuthError;
use crate::extractors::{AuthUser, Json};
use crate::models::audit_log;
use crate::models::user::{Role, UserResponse};
use crate::response::{ApiResponse, MessageResponse};
use crate::state::AppState;

use super::auth::UserEnvelope;

const ADMINS: &[Role] = &[Role::Admin];

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    /// Maximum number of entries (1 to 500, default 50)
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(audit_logs))
        .route("/users/{id}", patch(update_user).delete(delete_user))
        .route_layer(from_fn(authorize(ADMINS)))
        .route_layer(from_fn_with_state(state, authenticate))
}

/// Most recent audit entries, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries", body = ApiResponse<Vec<audit_log::Model>>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<ApiResponse<Vec<audit_log::Model>>, AuthError> {
    let entries = state.auth.recent_audit_logs(query.limit).await?;
    Ok(ApiResponse::success(entries))
}

/// Change a user's role or active flag.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserEnvelope>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    client: ClientInfo,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<ApiResponse<UserEnvelope>, AuthError> {
    let updated = state
        .auth
        .update_user(
            &actor,
            id,
            UserUpdate {
                role: payload.role,
                is_active: payload.is_active,
            },
            &client,
        )
        .await?;

    Ok(ApiResponse::success(UserEnvelope {
        user: UserResponse::from(updated),
    }))
}

/// Delete a user. Tokens and sessions are removed; audit history stays.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    client: ClientInfo,
    Path(id): Path<i32>,
) -> Result<ApiResponse<MessageResponse>, AuthError> {
    state.auth.delete_user(&actor, id, &client).await?;
    Ok(ApiResponse::success(MessageResponse::new("User deleted")))
}

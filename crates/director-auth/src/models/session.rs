use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Server-side session with sliding expiration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Public session id (UUID v4)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: i32,

    /// SHA-256 of the session token
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    /// Pushed forward on every authenticated use
    pub expires_at: NaiveDateTime,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Session data safe to return to the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl From<Model> for SessionResponse {
    fn from(session: Model) -> Self {
        SessionResponse {
            session_id: session.id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

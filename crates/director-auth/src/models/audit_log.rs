use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Append-only audit trail of account events.
///
/// `user_id` is set to NULL when the user is deleted so the history
/// survives.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "audit_logs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: Option<i32>,

    /// One of the `AuditAction` strings
    pub action: String,

    pub entity_type: String,
    pub entity_id: Option<i32>,

    /// Free-form context (never secrets)
    pub details: Option<String>,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

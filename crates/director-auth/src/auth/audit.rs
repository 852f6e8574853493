use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

use crate::auth::client::ClientInfo;
use crate::error::AuthError;
use crate::models::audit_log;

/// Audited account events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Register,
    Login,
    LoginFailed,
    Logout,
    PasswordResetRequested,
    PasswordReset,
    EmailVerified,
    PasswordChanged,
    ProfileUpdated,
    UserUpdated,
    UserDeleted,
    SessionCreated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "register",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::EmailVerified => "email_verified",
            AuditAction::PasswordChanged => "password_changed",
            AuditAction::ProfileUpdated => "profile_updated",
            AuditAction::UserUpdated => "user_updated",
            AuditAction::UserDeleted => "user_deleted",
            AuditAction::SessionCreated => "session_created",
        }
    }

    fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::SessionCreated => "session",
            _ => "user",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit entry waiting to be written.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    action: AuditAction,
    user_id: Option<i32>,
    entity_id: Option<i32>,
    details: Option<String>,
    client: ClientInfo,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        AuditEvent {
            action,
            user_id: None,
            entity_id: None,
            details: None,
            client: ClientInfo::default(),
        }
    }

    /// Attribute the event to a user (also used as the entity id).
    pub fn user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self.entity_id.get_or_insert(user_id);
        self
    }

    pub fn entity(mut self, entity_id: i32) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.client = client.clone();
        self
    }
}

/// Append an audit entry.
pub async fn record(db: &DatabaseConnection, event: AuditEvent) -> Result<(), AuthError> {
    let model = audit_log::ActiveModel {
        user_id: Set(event.user_id),
        action: Set(event.action.as_str().to_string()),
        entity_type: Set(event.action.entity_type().to_string()),
        entity_id: Set(event.entity_id),
        details: Set(event.details),
        ip_address: Set(event.client.ip_address),
        user_agent: Set(event.client.user_agent),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    model.insert(db).await?;
    Ok(())
}

/// Append an audit entry; a failed write is logged and otherwise ignored.
pub async fn record_quietly(db: &DatabaseConnection, event: AuditEvent) {
    let action = event.action;
    if let Err(e) = record(db, event).await {
        tracing::warn!(action = %action, error = %e, "failed to write audit log");
    }
}

/// Most recent entries first.
pub async fn recent(db: &DatabaseConnection, limit: u64) -> Result<Vec<audit_log::Model>, AuthError> {
    Ok(audit_log::Entity::find()
        .order_by_desc(audit_log::Column::CreatedAt)
        .order_by_desc(audit_log::Column::Id)
        .limit(limit)
        .all(db)
        .await?)
}

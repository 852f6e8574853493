use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set, SqlErr, sea_query::Expr,
};
use tokio::sync::OnceCell;

use crate::auth::audit::{self, AuditAction, AuditEvent};
use crate::auth::client::ClientInfo;
use crate::auth::jwt::{issue_access_token, verify_access_token};
use crate::auth::lockout::{check_lockout, record_failed_attempt, record_successful_login};
use crate::auth::notify::AccountNotifier;
use crate::auth::password::{hash_password_async, validate_password_strength, verify_password_async};
use crate::auth::refresh::{self, Revoked};
use crate::auth::sanitize::{
    normalize_email, normalize_optional, normalize_username, validate_email, validate_username,
};
use crate::auth::session::{self, NewSession};
use crate::auth::token::{generate_opaque_token, hash_token};
use crate::config::Config;
use crate::error::AuthError;
use crate::models::{audit_log, session as session_model, user};
use crate::models::user::Role;

const DEFAULT_AUDIT_LIMIT: u64 = 50;
const MAX_AUDIT_LIMIT: u64 = 500;

/// Registration input, as received from the client.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A signed access token plus its refresh token.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct Registered {
    pub user: user::Model,
    pub tokens: AuthTokens,
    /// Raw verification token; only its digest is stored.
    pub verification_token: String,
}

#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user: user::Model,
    pub tokens: AuthTokens,
}

/// Partial profile update. `Some("")` clears a name field.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// Administrative changes to another account.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Account lifecycle: registration, login with lockout, token refresh,
/// password reset, email verification and administration.
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    config: Arc<Config>,
    notifier: Arc<dyn AccountNotifier>,
    /// Checked against when no account matches a login, built on first use
    /// with the configured cost.
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<Config>,
        notifier: Arc<dyn AccountNotifier>,
    ) -> Self {
        AuthService {
            db,
            config,
            notifier,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Registration & login ──

    /// Create an account and sign it in.
    pub async fn register(
        &self,
        input: RegisterInput,
        client: &ClientInfo,
    ) -> Result<Registered, AuthError> {
        let verification_token = generate_opaque_token();
        let user = self
            .insert_account(input, Role::User, Some(&verification_token))
            .await?;
        let tokens = self.issue_tokens(&user).await?;

        if let Err(e) = self
            .notifier
            .send_email_verification(&user, &verification_token)
            .await
        {
            tracing::warn!(user_id = user.id, error = %e, "verification notice not delivered");
        }

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::Register)
                .user(user.id)
                .client(client),
        )
        .await;
        tracing::info!(user_id = user.id, "user registered");

        Ok(Registered {
            user,
            tokens,
            verification_token,
        })
    }

    /// Create a verified administrator. Used to bootstrap a deployment,
    /// where no admin exists yet to promote anyone.
    pub async fn create_admin(
        &self,
        input: RegisterInput,
        client: &ClientInfo,
    ) -> Result<user::Model, AuthError> {
        let user = self.insert_account(input, Role::Admin, None).await?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::Register)
                .user(user.id)
                .details("role=admin")
                .client(client),
        )
        .await;
        tracing::info!(user_id = user.id, "admin account created");

        Ok(user)
    }

    /// Authenticate by email or username and password.
    ///
    /// Unknown identities and wrong passwords produce the same
    /// `InvalidCredentials` and both pay for one Argon2 verification. A
    /// locked account is rejected before the password is looked at.
    pub async fn login(
        &self,
        email_or_username: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoggedIn, AuthError> {
        let identifier = normalize_email(email_or_username);

        let Some(mut user) = self.find_by_email_or_username(&identifier).await? else {
            self.verify_against_decoy(password).await?;
            audit::record_quietly(
                &self.db,
                AuditEvent::new(AuditAction::LoginFailed)
                    .details("unknown identity")
                    .client(client),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now().naive_utc();

        if let Err(e) = check_lockout(&user, now) {
            audit::record_quietly(
                &self.db,
                AuditEvent::new(AuditAction::LoginFailed)
                    .user(user.id)
                    .details("account locked")
                    .client(client),
            )
            .await;
            tracing::warn!(user_id = user.id, "login attempt on locked account");
            return Err(e);
        }

        let matches =
            verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !matches {
            record_failed_attempt(&self.db, user.id, &self.config.security, now).await?;
            audit::record_quietly(
                &self.db,
                AuditEvent::new(AuditAction::LoginFailed)
                    .user(user.id)
                    .details("invalid password")
                    .client(client),
            )
            .await;
            if user.failed_login_attempts + 1 >= self.config.security.max_login_attempts as i32 {
                tracing::warn!(user_id = user.id, "account locked after repeated failed logins");
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        record_successful_login(&self.db, user.id, now).await?;
        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login_at = Some(now);
        user.updated_at = now;

        let tokens = self.issue_tokens(&user).await?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::Login)
                .user(user.id)
                .client(client),
        )
        .await;

        Ok(LoggedIn { user, tokens })
    }

    /// Revoke the given refresh token, or every credential of the user
    /// when `all_sessions` is set.
    pub async fn logout(
        &self,
        user: &user::Model,
        refresh_token: Option<&str>,
        all_sessions: bool,
        client: &ClientInfo,
    ) -> Result<Revoked, AuthError> {
        let revoked = if all_sessions {
            refresh::revoke_all_user_tokens(&self.db, user.id).await?
        } else if let Some(token) = refresh_token {
            Revoked {
                refresh_tokens: refresh::revoke_user_refresh_token(&self.db, user.id, token)
                    .await?,
                sessions: 0,
            }
        } else {
            Revoked::default()
        };

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::Logout)
                .user(user.id)
                .details(if all_sessions { "all sessions" } else { "single token" })
                .client(client),
        )
        .await;

        Ok(revoked)
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// stays valid.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<(String, user::Model), AuthError> {
        let stored = refresh::verify_refresh_token(&self.db, refresh_token).await?;

        let user = user::Entity::find_by_id(stored.user_id)
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let access_token = issue_access_token(
            &user,
            &self.config.jwt_secret,
            self.config.access_token_ttl(),
        )?;
        Ok((access_token, user))
    }

    // ── One-time tokens ──

    /// Start a password reset. Succeeds identically whether or not the
    /// email belongs to an account, and does the same database work either
    /// way.
    pub async fn forgot_password(&self, email: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(&self.db)
            .await?;

        let reset_token = generate_opaque_token();
        let now = Utc::now().naive_utc();
        let expires = now + Duration::seconds(self.config.security.password_reset_expiry_secs as i64);

        // Matches no row for an unknown address.
        user::Entity::update_many()
            .col_expr(user::Column::ResetToken, Expr::value(Some(hash_token(&reset_token))))
            .col_expr(user::Column::ResetTokenExpires, Expr::value(Some(expires)))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Email.eq(&email))
            .exec(&self.db)
            .await?;

        let event = AuditEvent::new(AuditAction::PasswordResetRequested).client(client);
        let event = match &account {
            Some(user) => {
                if let Err(e) = self.notifier.send_password_reset(user, &reset_token).await {
                    tracing::warn!(user_id = user.id, error = %e, "password reset notice not delivered");
                }
                event.user(user.id)
            }
            None => {
                tracing::debug!("password reset requested for unknown email");
                event.details("unknown email")
            }
        };
        audit::record_quietly(&self.db, event).await;

        Ok(())
    }

    /// Set a new password with a reset token.
    ///
    /// The token must match and be unexpired. It is consumed by the same
    /// UPDATE that stores the new password, so it works at most once. Every
    /// refresh token and session of the user is revoked and any lockout is
    /// lifted.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        validate_password_strength(new_password).into_result("newPassword")?;

        let digest = hash_token(token.trim());
        let now = Utc::now().naive_utc();

        let user = user::Entity::find()
            .filter(user::Column::ResetToken.eq(&digest))
            .filter(user::Column::ResetTokenExpires.gt(now))
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidOneTimeToken)?;

        let password_hash =
            hash_password_async(new_password.to_string(), self.config.security.clone()).await?;

        let consumed = user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::ResetToken, Expr::value(Option::<String>::None))
            .col_expr(
                user::Column::ResetTokenExpires,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(user::Column::FailedLoginAttempts, Expr::value(0))
            .col_expr(
                user::Column::LockedUntil,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user.id))
            .filter(user::Column::ResetToken.eq(&digest))
            .exec(&self.db)
            .await?;

        if consumed.rows_affected == 0 {
            return Err(AuthError::InvalidOneTimeToken);
        }

        let revoked = refresh::revoke_all_user_tokens(&self.db, user.id).await?;
        tracing::info!(
            user_id = user.id,
            refresh_tokens = revoked.refresh_tokens,
            sessions = revoked.sessions,
            "password reset, credentials revoked"
        );

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::PasswordReset)
                .user(user.id)
                .client(client),
        )
        .await;

        Ok(())
    }

    /// Mark the email verified. The token is single-use.
    pub async fn verify_email(&self, token: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidOneTimeToken);
        }
        let digest = hash_token(token);

        let user = user::Entity::find()
            .filter(user::Column::VerificationToken.eq(&digest))
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidOneTimeToken)?;

        let result = user::Entity::update_many()
            .col_expr(user::Column::IsVerified, Expr::value(true))
            .col_expr(
                user::Column::VerificationToken,
                Expr::value(Option::<String>::None),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(user::Column::Id.eq(user.id))
            .filter(user::Column::VerificationToken.eq(&digest))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AuthError::InvalidOneTimeToken);
        }

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::EmailVerified)
                .user(user.id)
                .client(client),
        )
        .await;

        Ok(())
    }

    // ── Authenticated account operations ──

    /// Change the password of a signed-in user after re-checking the
    /// current one.
    pub async fn change_password(
        &self,
        user: &user::Model,
        current_password: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let matches =
            verify_password_async(current_password.to_string(), user.password_hash.clone())
                .await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        validate_password_strength(new_password).into_result("newPassword")?;
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must differ from the current password".to_string(),
            ));
        }

        let password_hash =
            hash_password_async(new_password.to_string(), self.config.security.clone()).await?;

        user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(user::Column::Id.eq(user.id))
            .exec(&self.db)
            .await?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::PasswordChanged)
                .user(user.id)
                .client(client),
        )
        .await;

        Ok(())
    }

    /// Update name fields and/or username of the signed-in user.
    pub async fn update_profile(
        &self,
        user: user::Model,
        update: ProfileUpdate,
        client: &ClientInfo,
    ) -> Result<user::Model, AuthError> {
        let user_id = user.id;
        let mut active = user.into_active_model();

        if let Some(username) = update.username.as_deref() {
            let username = normalize_username(username);
            validate_username(&username).map_err(|e| AuthError::validation_fields(vec![e]))?;
            self.ensure_identity_available(None, Some(&username), Some(user_id))
                .await?;
            active.username = Set(username);
        }
        if let Some(first_name) = update.first_name.as_deref() {
            active.first_name = Set(normalize_optional(Some(first_name)));
        }
        if let Some(last_name) = update.last_name.as_deref() {
            active.last_name = Set(normalize_optional(Some(last_name)));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        let updated = active.update(&self.db).await.map_err(duplicate_or_db)?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::ProfileUpdated)
                .user(user_id)
                .client(client),
        )
        .await;

        Ok(updated)
    }

    // ── Sessions ──

    /// Open a server-side session for an already authenticated user.
    pub async fn open_session(
        &self,
        user: &user::Model,
        client: &ClientInfo,
    ) -> Result<NewSession, AuthError> {
        let created = session::create_session(
            &self.db,
            user.id,
            client.ip_address.clone(),
            client.user_agent.clone(),
            self.config.security.session_timeout_secs,
        )
        .await?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::SessionCreated)
                .user(user.id)
                .details(created.session_id.clone())
                .client(client),
        )
        .await;

        Ok(created)
    }

    pub async fn close_session(&self, session_token: &str) -> Result<u64, AuthError> {
        session::revoke_session(&self.db, session_token).await
    }

    /// Resolve a bearer access token to an active user.
    pub async fn authenticate_bearer(&self, access_token: &str) -> Result<user::Model, AuthError> {
        let claims = verify_access_token(access_token, &self.config.jwt_secret)?;

        let user = user::Entity::find_by_id(claims.user_id()?)
            .one(&self.db)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }
        Ok(user)
    }

    /// Resolve a session token to its user and session, sliding the expiry
    /// forward.
    pub async fn authenticate_session(
        &self,
        session_token: &str,
    ) -> Result<(user::Model, session_model::Model), AuthError> {
        let mut current = session::verify_session(&self.db, session_token).await?;
        current.expires_at = session::extend_session(
            &self.db,
            session_token,
            self.config.security.session_timeout_secs,
        )
        .await?;

        let user = user::Entity::find_by_id(current.user_id)
            .one(&self.db)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }
        Ok((user, current))
    }

    // ── Administration ──

    pub async fn find_user(&self, user_id: i32) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find_by_id(user_id).one(&self.db).await?)
    }

    /// Change another account's role or active flag. Deactivation revokes
    /// the account's refresh tokens and sessions.
    pub async fn update_user(
        &self,
        actor: &user::Model,
        user_id: i32,
        update: UserUpdate,
        client: &ClientInfo,
    ) -> Result<user::Model, AuthError> {
        let target = self
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {user_id}")))?;

        let mut changes = Vec::new();
        let mut active = target.into_active_model();
        if let Some(role) = update.role {
            active.role = Set(role.as_str().to_string());
            changes.push(format!("role={role}"));
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
            changes.push(format!("is_active={is_active}"));
        }
        active.updated_at = Set(Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;

        if update.is_active == Some(false) {
            refresh::revoke_all_user_tokens(&self.db, user_id).await?;
        }

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::UserUpdated)
                .user(actor.id)
                .entity(user_id)
                .details(changes.join(","))
                .client(client),
        )
        .await;

        Ok(updated)
    }

    /// Set the role of the account matching an email or username, without
    /// an acting user.
    pub async fn set_role_by_identifier(
        &self,
        email_or_username: &str,
        role: Role,
        client: &ClientInfo,
    ) -> Result<user::Model, AuthError> {
        let identifier = normalize_email(email_or_username);
        let target = self
            .find_by_email_or_username(&identifier)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {identifier}")))?;
        let user_id = target.id;

        let mut active = target.into_active_model();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::UserUpdated)
                .entity(user_id)
                .details(format!("role={role}"))
                .client(client),
        )
        .await;
        tracing::info!(user_id, %role, "role changed");

        Ok(updated)
    }

    /// Delete an account. Tokens and sessions go with it; audit history is
    /// kept with the user reference cleared.
    pub async fn delete_user(
        &self,
        actor: &user::Model,
        user_id: i32,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let result = user::Entity::delete_by_id(user_id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AuthError::NotFound(format!("user {user_id}")));
        }

        audit::record_quietly(
            &self.db,
            AuditEvent::new(AuditAction::UserDeleted)
                .user(actor.id)
                .entity(user_id)
                .client(client),
        )
        .await;
        tracing::info!(user_id, actor_id = actor.id, "user deleted");

        Ok(())
    }

    pub async fn recent_audit_logs(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<audit_log::Model>, AuthError> {
        let limit = limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT);
        audit::recent(&self.db, limit).await
    }

    // ── Helpers ──

    /// Validate, hash and insert a new account. Without a verification
    /// token the account starts out verified.
    async fn insert_account(
        &self,
        input: RegisterInput,
        role: Role,
        verification_token: Option<&str>,
    ) -> Result<user::Model, AuthError> {
        let email = normalize_email(&input.email);
        let username = normalize_username(&input.username);

        let mut errors = Vec::new();
        if let Err(e) = validate_email(&email) {
            errors.push(e);
        }
        if let Err(e) = validate_username(&username) {
            errors.push(e);
        }
        errors.extend(validate_password_strength(&input.password).field_errors("password"));
        if !errors.is_empty() {
            return Err(AuthError::validation_fields(errors));
        }

        self.ensure_identity_available(Some(&email), Some(&username), None)
            .await?;

        let password_hash =
            hash_password_async(input.password, self.config.security.clone()).await?;
        let now = Utc::now().naive_utc();

        let new_user = user::ActiveModel {
            email: Set(email),
            username: Set(username),
            password_hash: Set(password_hash),
            first_name: Set(normalize_optional(input.first_name.as_deref())),
            last_name: Set(normalize_optional(input.last_name.as_deref())),
            role: Set(role.as_str().to_string()),
            is_active: Set(true),
            is_verified: Set(verification_token.is_none()),
            verification_token: Set(verification_token.map(hash_token)),
            reset_token: Set(None),
            reset_token_expires: Set(None),
            failed_login_attempts: Set(0),
            locked_until: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        new_user.insert(&self.db).await.map_err(duplicate_or_db)
    }

    /// Run one password verification whose outcome is discarded.
    async fn verify_against_decoy(&self, password: &str) -> Result<(), AuthError> {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| {
                hash_password_async(generate_opaque_token(), self.config.security.clone())
            })
            .await?;
        verify_password_async(password.to_string(), decoy.clone()).await?;
        Ok(())
    }

    async fn issue_tokens(&self, user: &user::Model) -> Result<AuthTokens, AuthError> {
        let access_token = issue_access_token(
            user,
            &self.config.jwt_secret,
            self.config.access_token_ttl(),
        )?;
        let refresh_token = refresh::issue_refresh_token(
            &self.db,
            user.id,
            self.config.security.refresh_token_expiry_days,
        )
        .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    async fn find_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<user::Model>, AuthError> {
        if let Some(user) = user::Entity::find()
            .filter(user::Column::Email.eq(identifier))
            .one(&self.db)
            .await?
        {
            return Ok(Some(user));
        }

        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(identifier))
            .one(&self.db)
            .await?)
    }

    /// `DuplicateIdentity` if the email or username is taken by an account
    /// other than `except`.
    async fn ensure_identity_available(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        except: Option<i32>,
    ) -> Result<(), AuthError> {
        let mut query = user::Entity::find();
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }

        if let Some(email) = email {
            let taken = query
                .clone()
                .filter(user::Column::Email.eq(email))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(AuthError::DuplicateIdentity(
                    "Email is already registered".to_string(),
                ));
            }
        }

        if let Some(username) = username {
            let taken = query
                .filter(user::Column::Username.eq(username))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(AuthError::DuplicateIdentity(
                    "Username is already taken".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// A unique-constraint race on insert/update is still a duplicate identity.
fn duplicate_or_db(err: DbErr) -> AuthError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AuthError::DuplicateIdentity("Email or username already exists".to_string())
        }
        _ => AuthError::Database(err),
    }
}

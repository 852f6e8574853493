use async_trait::async_trait;

use crate::error::AuthError;
use crate::models::user;

/// Delivery of one-time account tokens (verification and password reset).
///
/// The service hands the raw token to the notifier and stores only its
/// digest. Delivery failures are logged by the caller and never change the
/// HTTP response.
#[async_trait]
pub trait AccountNotifier: Send + Sync {
    async fn send_email_verification(&self, user: &user::Model, token: &str)
    -> Result<(), AuthError>;

    async fn send_password_reset(&self, user: &user::Model, token: &str) -> Result<(), AuthError>;
}

/// Notifier that writes to the log. Tokens are only included when
/// `reveal_tokens` is set (development).
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    reveal_tokens: bool,
}

impl LogNotifier {
    pub fn new(reveal_tokens: bool) -> Self {
        LogNotifier { reveal_tokens }
    }
}

#[async_trait]
impl AccountNotifier for LogNotifier {
    async fn send_email_verification(
        &self,
        user: &user::Model,
        token: &str,
    ) -> Result<(), AuthError> {
        if self.reveal_tokens {
            tracing::info!(user_id = user.id, email = %user.email, token, "email verification token issued");
        } else {
            tracing::info!(user_id = user.id, "email verification token issued");
        }
        Ok(())
    }

    async fn send_password_reset(&self, user: &user::Model, token: &str) -> Result<(), AuthError> {
        if self.reveal_tokens {
            tracing::info!(user_id = user.id, email = %user.email, token, "password reset token issued");
        } else {
            tracing::info!(user_id = user.id, "password reset token issued");
        }
        Ok(())
    }
}

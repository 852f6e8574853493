use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Serialize;

use crate::config::SecurityConfig;
use crate::error::{AuthError, FieldError};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Outcome of [`validate_password_strength`].
///
/// Every violated rule is listed, not only the first one, so a client can
/// render the whole checklist at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<PasswordRule>,
}

/// A single strength rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    TooShort,
    MissingLowercase,
    MissingUppercase,
    MissingDigit,
    MissingSymbol,
}

impl PasswordRule {
    pub fn code(&self) -> &'static str {
        match self {
            PasswordRule::TooShort => "password_too_short",
            PasswordRule::MissingLowercase => "password_lowercase",
            PasswordRule::MissingUppercase => "password_uppercase",
            PasswordRule::MissingDigit => "password_digit",
            PasswordRule::MissingSymbol => "password_symbol",
        }
    }

    pub fn message(&self) -> String {
        match self {
            PasswordRule::TooShort => {
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long")
            }
            PasswordRule::MissingLowercase => {
                "Password must contain at least one lowercase letter".to_string()
            }
            PasswordRule::MissingUppercase => {
                "Password must contain at least one uppercase letter".to_string()
            }
            PasswordRule::MissingDigit => "Password must contain at least one number".to_string(),
            PasswordRule::MissingSymbol => {
                "Password must contain at least one special character".to_string()
            }
        }
    }
}

impl PasswordStrength {
    /// Field errors for a validation response, one per violated rule.
    pub fn field_errors(&self, field: &str) -> Vec<FieldError> {
        self.errors
            .iter()
            .map(|rule| FieldError::with_code(field, rule.message(), rule.code()))
            .collect()
    }

    /// `Ok(())` when valid, otherwise a validation error listing every rule.
    pub fn into_result(self, field: &str) -> Result<(), AuthError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(AuthError::validation_fields(self.field_errors(field)))
        }
    }
}

/// Check a plaintext password against the strength rules.
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(PasswordRule::TooShort);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push(PasswordRule::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push(PasswordRule::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(PasswordRule::MissingDigit);
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        errors.push(PasswordRule::MissingSymbol);
    }

    PasswordStrength {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn hasher(config: &SecurityConfig) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(
        config.password_hash_memory_kib,
        config.password_hash_iterations,
        config.password_hash_parallelism,
        None,
    )
    .map_err(|e| AuthError::Internal(format!("Invalid password hash parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password using Argon2id with the configured cost.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher(config)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a plaintext password against a stored hash.
///
/// The cost parameters are read back from the PHC string, so hashes made
/// under an older configuration keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(
    password: String,
    config: SecurityConfig,
) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))?
}

//! Input normalisation for user-supplied strings.
//!
//! `sanitize_input` removes angle brackets and NUL bytes. It is a blunt
//! filter and does not replace context-aware escaping when rendering.

use validator::ValidateEmail;

use crate::error::FieldError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

/// Trim and strip `<`, `>` and NUL characters.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\0'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitise and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    sanitize_input(email).to_lowercase()
}

/// Sanitise and lower-case a username.
pub fn normalize_username(username: &str) -> String {
    sanitize_input(username).to_lowercase()
}

/// Sanitise an optional profile field; blank becomes `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value.map(sanitize_input).filter(|v| !v.is_empty())
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(FieldError::with_code(
            "email",
            "Must be a valid email address",
            "email",
        ))
    }
}

/// Usernames are 3 to 30 characters of `[a-z0-9_.-]` (after lower-casing).
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(FieldError::with_code(
            "username",
            format!("Username must be {USERNAME_MIN_LEN} to {USERNAME_MAX_LEN} characters"),
            "username_length",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
    {
        return Err(FieldError::with_code(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
            "username_charset",
        ));
    }
    Ok(())
}

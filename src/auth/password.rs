//! Argon2id password hashing.

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use rand::rngs::OsRng;

use crate::error::AppError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Hash verified against when a login names an unknown account, so both
/// failures cost one Argon2 run. It belongs to no account.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("unknown-account-placeholder").unwrap_or_default());

/// A valid Argon2id PHC string bound to no account.
#[must_use]
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.as_str()
}

/// Rejects passwords shorter than [`MIN_PASSWORD_CHARS`].
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for a short password.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::invalid(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

/// Hashes a password into a PHC string with a random salt.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

/// Checks a candidate password against a stored PHC string.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the stored hash is malformed.
pub fn verify_password(candidate: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(format!("invalid stored password hash: {e}")))?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(other) => Err(AppError::Internal(format!(
            "password verification failed: {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let Ok(hash) = hash_password("correct horse") else {
            panic!("hashing failed");
        };
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(verify_password("correct horse", &hash).ok(), Some(true));
        assert_eq!(verify_password("wrong horse", &hash).ok(), Some(false));
    }

    #[test]
    fn malformed_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn dummy_hash_is_a_verifiable_hash() {
        assert!(dummy_hash().starts_with("$argon2id$"));
        assert_eq!(verify_password("correct-horse-battery", dummy_hash()).ok(), Some(false));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}

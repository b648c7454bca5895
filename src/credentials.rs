//! Input normalization and password handling shared by the account services.
//! Passwords are stored as Argon2id PHC strings, never as plaintext.

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::core::app_error::AppError;

/// Trim and lower-case an email credential.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Trim a free-text field. Government ids and contacts keep their case.
pub fn normalize_field(raw: &str) -> String {
    raw.trim().to_owned()
}

/// Missing optional fields collapse to the empty string.
pub fn normalize_optional(raw: Option<String>) -> String {
    raw.as_deref().map(str::trim).unwrap_or_default().to_owned()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{email} is not a valid email address"
        )))
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow!("Failed to hash password: {err}")))
}

pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ama@Example.COM "), "ama@example.com");
    }

    #[test]
    fn fields_are_trimmed_but_keep_case() {
        assert_eq!(normalize_field("  GHA-0012  "), "GHA-0012");
        assert_eq!(normalize_optional(None), "");
        assert_eq!(normalize_optional(Some(" 024000000 ".into())), "024000000");
    }

    #[test]
    fn email_validation_requires_local_and_domain_parts() {
        assert!(validate_email("ama@example.com").is_ok());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ama@nodot").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn hashed_passwords_verify_and_reject() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }
}

use bcrypt::{hash, verify};
use crate::errors::{AppError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hashed once at startup to give unknown-email logins a hash to verify.
pub const DECOY_PASSWORD: &str = "impressio-decoy-password";

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str, cost: u32) -> Result<String> {
        hash(password, cost)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))
    }

    /// Checks `password` against the account's hash, or against `decoy` when
    /// there is no account, so both cases pay for one bcrypt verification.
    pub fn verify_or_decoy(password: &str, stored_hash: Option<&str>, decoy: &str) -> Result<bool> {
        match stored_hash {
            Some(hash) => Self::verify_password(password, hash),
            None => Self::verify_password(password, decoy).map(|_| false),
        }
    }

    pub fn validate_credentials(email: &str, password: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing_and_verification() {
        let password = "TestPassword123!";
        let hash = PasswordService::hash_password(password, 4).unwrap();

        assert_ne!(hash, password);
        assert!(PasswordService::verify_password(password, &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = PasswordService::hash_password("same-password", 4).unwrap();
        let b = PasswordService::hash_password("same-password", 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_credential_validation() {
        assert!(PasswordService::validate_credentials("user@example.com", "longenough").is_ok());
        assert!(PasswordService::validate_credentials("not-an-email", "longenough").is_err());
        assert!(PasswordService::validate_credentials("", "longenough").is_err());
        assert!(PasswordService::validate_credentials("user@example.com", "short").is_err());
    }

    #[test]
    fn test_missing_account_still_verifies_against_decoy() {
        let decoy = PasswordService::hash_password(DECOY_PASSWORD, 4).unwrap();

        // even the decoy's own password never logs in
        assert!(!PasswordService::verify_or_decoy(DECOY_PASSWORD, None, &decoy).unwrap());

        // a malformed decoy surfaces, so the hash check really ran
        assert!(PasswordService::verify_or_decoy("anything", None, "not-a-bcrypt-hash").is_err());

        let stored = PasswordService::hash_password("real-password", 4).unwrap();
        assert!(PasswordService::verify_or_decoy("real-password", Some(&stored), &decoy).unwrap());
    }
}

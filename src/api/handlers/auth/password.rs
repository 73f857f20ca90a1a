//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings, so parameters and salt travel with the
//! hash and can be upgraded without a migration. Verification failures and
//! unparseable stored hashes both report a plain mismatch.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash.
///
/// A stored hash that cannot be parsed counts as a mismatch, so stale or
/// corrupt rows surface as failed logins instead of 500s.
pub(super) fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("correct horse battery stapl", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("same-password", &first));
        assert!(verify_password("same-password", &second));
    }

    #[test]
    fn unparseable_stored_hash_is_a_mismatch() {
        assert!(!verify_password("password", ""));
        assert!(!verify_password("password", "not-a-phc-string"));
        // md5-style legacy value
        assert!(!verify_password(
            "password",
            "5f4dcc3b5aa765d61d8327deb882cf99"
        ));
    }
}

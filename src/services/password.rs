//! Password hashing
//!
//! Argon2id hashing and verification for administrator accounts. Hashes are
//! stored as PHC strings (algorithm, parameters, salt and digest together).

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

/// Hash of a throwaway password, verified against when an account does not
/// exist so both paths cost one Argon2 run.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("bizdir-dummy-password").ok());

/// Hash a password using Argon2id with a random salt.
///
/// ```ignore
/// let hash = hash_password("changeme123")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only if `hash` is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Burn one verification against a throwaway hash; always "fails".
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

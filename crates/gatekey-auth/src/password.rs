//! Password hashing and verification.
//!
//! Argon2id with per-hash random salts, stored as PHC strings.
//!
//! # Security
//!
//! - Salts are generated using OsRng (cryptographically secure RNG)
//! - Hashing uses Argon2id (hybrid mode) with default parameters
//! - Verification is constant-time within the underlying implementation
//!
//! Both functions are CPU-bound; callers in async context run them on
//! `tokio::task::spawn_blocking` (see `service.rs`).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a password for storage using Argon2id.
///
/// # Returns
///
/// PHC-formatted hash string suitable for database storage.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
///
/// # Example
///
/// ```
/// use gatekey_auth::password::hash_password;
///
/// let hash = hash_password("s3cret").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash.
///
/// # Returns
///
/// `Ok(true)` if the password matches, `Ok(false)` if it doesn't.
/// Returns `Err` only if the stored hash is not a valid PHC string —
/// a wrong password is never an error.
///
/// # Example
///
/// ```
/// use gatekey_auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("s3cret").unwrap();
/// assert!(verify_password("s3cret", &hash).unwrap());
/// assert!(!verify_password("wrong", &hash).unwrap());
/// ```
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

//! Password hashing for stored users.
//!
//! The store keeps passwords as opaque text. Callers hash before
//! [`create_user`](crate::store::LibraryStore::create_user) and verify against the
//! stored PHC string on login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Failed to hash password: {0}")]
    Hash(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

/// Hash a password using Argon2 with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialsError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialsError::Hash(e.to_string()))
}

/// Check `password` against a hash produced by [`hash_password`].
pub fn verify_password(password: &str, hash: &str) -> Result<bool, CredentialsError> {
    let parsed = PasswordHash::new(hash).map_err(|e| CredentialsError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

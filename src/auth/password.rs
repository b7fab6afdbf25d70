//! Password hashing (bcrypt).
//!
//! The `*_blocking` helpers run on Tokio's blocking pool; call them from handlers.

use bcrypt::BcryptError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] BcryptError),

    #[error("hashing task failed: {0}")]
    Join(#[from] JoinError),
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(password, hash)?)
}

pub async fn hash_blocking(password: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost)).await?
}

pub async fn verify_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("hunter22", 4).unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_corrupt_hash_is_error() {
        assert!(verify_password("hunter22", "not-a-bcrypt-hash").is_err());
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = hash_blocking("secret1".to_string(), 4).await.unwrap();
        assert!(verify_blocking("secret1".to_string(), hash).await.unwrap());
    }
}

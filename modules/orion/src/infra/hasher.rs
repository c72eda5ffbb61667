use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::{DomainError, PasswordHasher};

const SCHEME: &str = "sha256";

/// Salted SHA-256, stored as `sha256$<salt>$<hex digest>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedSha256Hasher;

impl SaltedSha256Hasher {
    fn digest(salt: &str, plain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(plain.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check `plain` against a value produced by [`PasswordHasher::hash`].
    #[must_use]
    pub fn verify(stored: &str, plain: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(SCHEME), Some(salt), Some(digest)) => Self::digest(salt, plain) == digest,
            _ => false,
        }
    }
}

#[async_trait]
impl PasswordHasher for SaltedSha256Hasher {
    async fn hash(&self, plain: &str) -> Result<String, DomainError> {
        if plain.is_empty() {
            return Err(DomainError::validation("password", "must not be empty"));
        }
        let salt = uuid::Uuid::new_v4().simple().to_string();
        Ok(format!("{SCHEME}${salt}${}", Self::digest(&salt, plain)))
    }
}

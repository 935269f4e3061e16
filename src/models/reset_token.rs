//! Password reset token model. The raw token never touches the database;
//! only its SHA-256 hex digest is stored.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ResetToken {
    pub id: i32,
    pub token_hash: String,
    pub email: String,
    pub user_type: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Generate a fresh random raw token (256 bits, hex-encoded).
    pub fn generate_raw() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Hash a raw token for storage or lookup.
    pub fn hash_raw(raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// A token only counts for the account it was issued to.
    pub fn matches(&self, email: &str, user_type: &str) -> bool {
        self.email == email && self.user_type == user_type
    }
}

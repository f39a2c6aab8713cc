//! Hash-chain capability.
//!
//! Each event stores the hash of its own content and the hash of the event
//! integrated immediately before it. The engine only talks to this trait; the
//! hashing algorithm belongs to the event type.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hex-encoded content hash. Empty marks "no predecessor".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash of the (absent) predecessor of a chain's first event.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// SHA-256 of `bytes`, hex encoded.
    pub fn sha256(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Content could not be hashed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("failed to serialize event content: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Tamper-evidence contract every event implements.
pub trait HashChained {
    /// Recompute the hash over the event's content, excluding the stored hash.
    fn content_hash(&self) -> Result<ContentHash, ChainError>;

    /// Hash recorded when the event was sealed.
    fn stored_hash(&self) -> &ContentHash;

    /// Content hash of the predecessor, fixed at construction time.
    fn previous_hash(&self) -> &ContentHash;
}

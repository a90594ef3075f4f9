//! # Storage Module
//!
//! The wallet persists three kinds of state, all through one small
//! key-value contract:
//!
//! | Key                      | Value                                  |
//! |--------------------------|----------------------------------------|
//! | `mpin:<userId>`          | SHA-256 hex of `"<userId>:<pin>"`      |
//! | `walletBalance:<userId>` | JSON `{"amount", "updatedAt"}`         |
//! | `offlineTransactions`    | JSON array of offline records (blob)   |
//!
//! Each `get`/`set`/`remove` is atomic on its one key. Nothing spans keys.
//!
//! ```text
//! memory.rs — MemoryStore, process-local map (tests, demos)
//! db.rs     — WalletDb, sled-backed store plus the offline log tree
//! ```

pub mod db;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use db::WalletDb;
pub use memory::MemoryStore;

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stored value under {0} is not valid UTF-8")]
    Encoding(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key-value persistence, one atomic operation per call.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or overwrite.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

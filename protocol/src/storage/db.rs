//! # WalletDb — sled-backed persistence
//!
//! ## Tree Layout
//!
//! | Tree      | Key                    | Value                          |
//! |-----------|------------------------|--------------------------------|
//! | `kv`      | key (UTF-8)            | value (UTF-8)                  |
//! | `offline` | sequence (8B BE u64)   | JSON `OfflineTransactionRecord` |
//!
//! The `kv` tree backs the [`KeyValueStore`] contract (MPIN hashes, wallet
//! snapshots, and the blob form of the offline ledger). The `offline` tree
//! backs the append-only log in [`crate::ledger::SledOfflineLog`]; its keys
//! are big-endian so sled's lexicographic order is insertion order.

use std::path::Path;

use async_trait::async_trait;
use sled::{Db, Tree};

use super::{KeyValueStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct WalletDb {
    db: Db,
    kv: Tree,
    offline: Tree,
}

impl WalletDb {
    /// Open or create a database at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that lives in memory and vanishes on drop.
    #[cfg(test)]
    pub(crate) fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let kv = db.open_tree("kv")?;
        let offline = db.open_tree("offline")?;
        Ok(Self { db, kv, offline })
    }

    /// The tree holding the append-only offline log.
    pub fn offline_tree(&self) -> Tree {
        self.offline.clone()
    }

    /// A monotonically increasing id, unique across restarts.
    pub fn generate_id(&self) -> StorageResult<u64> {
        Ok(self.db.generate_id()?)
    }

    /// Block until every pending write is durable.
    pub async fn flush(&self) -> StorageResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for WalletDb {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Encoding(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.kv.insert(key.as_bytes(), value.as_bytes())?;
        self.flush().await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.kv.remove(key.as_bytes())?;
        self.flush().await
    }
}

//! # Offline Transaction Ledger
//!
//! Every exchange that passed both signature checks is kept as an
//! [`OfflineTransactionRecord`], waiting to be reconciled once a connection
//! is available. Records are only ever appended; nothing here edits or
//! removes one, and no id is deduplicated.
//!
//! Two stores implement [`OfflineStore`]:
//!
//! | Store              | Layout                                              |
//! |--------------------|-----------------------------------------------------|
//! | `BlobOfflineStore` | one JSON array under `offlineTransactions`, rewritten per append |
//! | `SledOfflineLog`   | one JSON record per sled entry, keyed by sequence number |
//!
//! The blob form is what a plain key-value store can offer. The sled log
//! writes only the new record, so an append costs the same regardless of
//! how many records came before.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::Tree;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::amount::Amount;
use crate::config::{OFFLINE_TRANSACTIONS_KEY, STATUS_STORED_OFFLINE};
use crate::exchange::{AckPayload, SignedPayload};
use crate::storage::{KeyValueStore, StorageError, StorageResult, WalletDb};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTransactionRecord {
    pub id: String,
    /// Always `STOREDOFFLINE`.
    pub status: String,
    pub payer_id: String,
    /// Receiver id of the vendor.
    pub vendor_id: String,
    pub amount: Amount,
    pub currency: String,
    pub payload: SignedPayload,
    pub ack: AckPayload,
    pub created_at: String,
}

impl OfflineTransactionRecord {
    /// A record for a verified exchange.
    pub fn stored_offline(
        id: String,
        payload: SignedPayload,
        ack: AckPayload,
        created_at: String,
    ) -> Self {
        Self {
            id,
            status: STATUS_STORED_OFFLINE.to_string(),
            payer_id: payload.payload.payer_id.clone(),
            vendor_id: payload.payload.vendor_id.clone(),
            amount: payload.payload.amount,
            currency: payload.payload.currency.clone(),
            payload,
            ack,
            created_at,
        }
    }
}

#[async_trait]
pub trait OfflineStore: Send + Sync {
    async fn append(&self, record: OfflineTransactionRecord) -> StorageResult<()>;

    /// Every record, oldest first.
    async fn records(&self) -> StorageResult<Vec<OfflineTransactionRecord>>;
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// The whole ledger as one JSON array in a key-value store.
///
/// A missing or unreadable blob reads as an empty ledger, so the next append
/// starts a fresh array.
pub struct BlobOfflineStore {
    store: Arc<dyn KeyValueStore>,
    write: Mutex<()>,
}

impl BlobOfflineStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> StorageResult<Vec<OfflineTransactionRecord>> {
        let Some(raw) = self.store.get(OFFLINE_TRANSACTIONS_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(error = %e, "unreadable offline ledger blob, starting empty");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl OfflineStore for BlobOfflineStore {
    async fn append(&self, record: OfflineTransactionRecord) -> StorageResult<()> {
        let _guard = self.write.lock().await;
        let mut records = self.read_all().await?;
        let id = record.id.clone();
        records.push(record);
        let json = serde_json::to_string(&records)?;
        self.store.set(OFFLINE_TRANSACTIONS_KEY, &json).await?;
        debug!(record_id = %id, total = records.len(), "offline record appended");
        Ok(())
    }

    async fn records(&self) -> StorageResult<Vec<OfflineTransactionRecord>> {
        self.read_all().await
    }
}

// ---------------------------------------------------------------------------
// Sled log
// ---------------------------------------------------------------------------

/// Append-only log in the database's `offline` tree.
///
/// Keys are big-endian ids from [`WalletDb::generate_id`], so iteration order
/// is append order, across restarts too.
pub struct SledOfflineLog {
    db: WalletDb,
    tree: Tree,
}

impl SledOfflineLog {
    pub fn new(db: WalletDb) -> Self {
        let tree = db.offline_tree();
        Self { db, tree }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl OfflineStore for SledOfflineLog {
    async fn append(&self, record: OfflineTransactionRecord) -> StorageResult<()> {
        let seq = self.db.generate_id()?;
        let json = serde_json::to_vec(&record)?;
        self.tree.insert(seq.to_be_bytes(), json)?;
        self.db.flush().await?;
        debug!(record_id = %record.id, seq, "offline record appended");
        Ok(())
    }

    async fn records(&self) -> StorageResult<Vec<OfflineTransactionRecord>> {
        let mut out = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (key, value) = entry.map_err(StorageError::from)?;
            match serde_json::from_slice(&value) {
                Ok(record) => out.push(record),
                Err(e) => warn!(key = ?key, error = %e, "skipping unreadable offline record"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{RandomIds, SystemClock};
    use crate::crypto::{derive, DerivationContext};
    use crate::discovery::VendorAdvertisement;
    use crate::exchange::{build_and_sign, AckBody};
    use crate::storage::MemoryStore;

    fn record(id: &str, amount: &str) -> OfflineTransactionRecord {
        let vendor_keys = derive(&DerivationContext::vendor("vendor-bridge", "a1b2c3"), "RX-4421");
        let vendor = VendorAdvertisement {
            id: "vendor-bridge".into(),
            receiver_id: "RX-4421".into(),
            session_nonce: format!("nonce-{}", id),
            profile_hash: "a1b2c3".into(),
            short_code: "441".into(),
            signal_strength: -48,
            vendor_public_key: vendor_keys.public_key_hex().to_string(),
            certificate: vendor_keys.certificate_hex().to_string(),
        };
        let payer = derive(&DerivationContext::payer("user-1", "1234"), "user-1");
        let payload = build_and_sign(
            &vendor,
            amount.parse().unwrap(),
            "user-1",
            None,
            &payer,
            &SystemClock,
            &RandomIds,
        )
        .unwrap();
        let ack = AckBody {
            ack_id: format!("ack-{}", id),
            payload_id: payload.payload.payload_id.clone(),
            vendor_id: "RX-4421".into(),
            session_nonce: vendor.session_nonce.clone(),
            timestamp: "2026-03-01T12:00:00.000Z".into(),
        }
        .sign(&vendor_keys)
        .unwrap();
        OfflineTransactionRecord::stored_offline(
            id.to_string(),
            payload,
            ack,
            "2026-03-01T12:00:00.100Z".into(),
        )
    }

    #[test]
    fn stored_offline_copies_payload_fields() {
        let r = record("offline-1", "75.25");
        assert_eq!(r.status, "STOREDOFFLINE");
        assert_eq!(r.payer_id, "user-1");
        assert_eq!(r.vendor_id, "RX-4421");
        assert_eq!(r.amount.to_string(), "75.25");
        assert_eq!(r.currency, "XOF");

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["createdAt"], "2026-03-01T12:00:00.100Z");
        assert_eq!(json["payload"]["amount"], "75.25");
        assert_eq!(json["amount"], "75.25");
        assert_eq!(json["ack"]["ackId"], "ack-offline-1");
    }

    #[tokio::test]
    async fn blob_store_appends_in_order() {
        let kv = Arc::new(MemoryStore::new());
        let store = BlobOfflineStore::new(kv.clone());
        assert!(store.records().await.unwrap().is_empty());

        store.append(record("offline-1", "10")).await.unwrap();
        let before = store.records().await.unwrap();
        store.append(record("offline-2", "20")).await.unwrap();
        let after = store.records().await.unwrap();

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].id, "offline-2");
        assert!(kv.get("offlineTransactions").await.unwrap().unwrap().starts_with('['));
    }

    #[tokio::test]
    async fn blob_store_keeps_duplicate_ids() {
        let store = BlobOfflineStore::new(Arc::new(MemoryStore::new()));
        store.append(record("offline-1", "10")).await.unwrap();
        store.append(record("offline-1", "10")).await.unwrap();
        assert_eq!(store.records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_blob_reads_empty_and_is_replaced() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("offlineTransactions", "{\"not\":\"an array\"}").await.unwrap();
        let store = BlobOfflineStore::new(kv);

        assert!(store.records().await.unwrap().is_empty());
        store.append(record("offline-1", "10")).await.unwrap();
        assert_eq!(store.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sled_log_appends_in_order() {
        let log = SledOfflineLog::new(WalletDb::open_temporary().unwrap());
        assert!(log.is_empty());

        for (i, amount) in ["10", "20.5", "30"].iter().enumerate() {
            log.append(record(&format!("offline-{}", i), amount)).await.unwrap();
        }

        let records = log.records().await.unwrap();
        assert_eq!(log.len(), 3);
        let amounts: Vec<_> = records.iter().map(|r| r.amount.to_string()).collect();
        assert_eq!(amounts, ["10", "20.5", "30"]);
    }

    #[tokio::test]
    async fn sled_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = SledOfflineLog::new(WalletDb::open(dir.path()).unwrap());
            log.append(record("offline-a", "10")).await.unwrap();
        }
        let log = SledOfflineLog::new(WalletDb::open(dir.path()).unwrap());
        log.append(record("offline-b", "20")).await.unwrap();

        let ids: Vec<_> = log.records().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["offline-a", "offline-b"]);
    }
}

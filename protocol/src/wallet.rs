//! # Wallet Ledger
//!
//! One balance per user, persisted as a JSON snapshot
//! `{"amount": "9950", "updatedAt": "..."}` under `walletBalance:<userId>`.
//! A wallet that has never been read starts at the configured default
//! balance, and that default is written back on first access.
//!
//! ## Concurrency
//!
//! `debit` is a read-modify-write. Every operation for a user runs under
//! that user's async mutex, so two concurrent debits can never both pass the
//! balance check against the same stale value. [`WalletLedger::lock`] hands
//! the lock to the caller as a [`WalletGuard`] when several operations must
//! see one consistent balance (the payment flow holds it from the balance
//! pre-check to the final debit).
//!
//! Balances are [`Amount`]s, which cannot be negative; a debit that would
//! take the balance below zero is refused before anything is written.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::amount::Amount;
use crate::clock::Clock;
use crate::config::WALLET_KEY_PREFIX;
use crate::storage::{KeyValueStore, StorageError};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("insufficient wallet balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The persisted form of a balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub amount: Amount,
    pub updated_at: String,
}

fn storage_key(user_id: &str) -> String {
    format!("{}{}", WALLET_KEY_PREFIX, user_id)
}

pub struct WalletLedger {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    default_balance: Amount,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, default_balance: Amount) -> Self {
        Self {
            store,
            clock,
            default_balance,
            locks: DashMap::new(),
        }
    }

    /// Take the user's lock. Other operations on the same user wait until
    /// the guard is dropped.
    pub async fn lock(&self, user_id: &str) -> WalletGuard<'_> {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        WalletGuard {
            ledger: self,
            user_id: user_id.to_string(),
            _guard: guard,
        }
    }

    /// Current balance, initialising the wallet on first access.
    pub async fn balance(&self, user_id: &str) -> Result<Amount, WalletError> {
        self.lock(user_id).await.balance().await
    }

    pub async fn set_balance(&self, user_id: &str, amount: Amount) -> Result<(), WalletError> {
        self.lock(user_id).await.set_balance(amount).await
    }

    /// Subtract `amount` and return the new balance.
    ///
    /// Fails with [`WalletError::InsufficientBalance`] when `amount` exceeds
    /// the balance; the stored value is left untouched in that case.
    pub async fn debit(&self, user_id: &str, amount: Amount) -> Result<Amount, WalletError> {
        self.lock(user_id).await.debit(amount).await
    }

    /// The stored snapshot, if any, without initialising the wallet.
    pub async fn snapshot(&self, user_id: &str) -> Result<Option<WalletSnapshot>, WalletError> {
        self.read_snapshot(user_id).await
    }

    async fn read_snapshot(&self, user_id: &str) -> Result<Option<WalletSnapshot>, WalletError> {
        let Some(raw) = self.store.get(&storage_key(user_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<WalletSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(user_id, error = %e, "unreadable wallet snapshot, treating as missing");
                Ok(None)
            }
        }
    }

    async fn write_snapshot(&self, user_id: &str, amount: Amount) -> Result<(), WalletError> {
        let snapshot = WalletSnapshot {
            amount,
            updated_at: self.clock.now_iso(),
        };
        let json = serde_json::to_string(&snapshot).map_err(StorageError::from)?;
        self.store.set(&storage_key(user_id), &json).await?;
        Ok(())
    }
}

/// Exclusive access to one user's wallet.
pub struct WalletGuard<'a> {
    ledger: &'a WalletLedger,
    user_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl WalletGuard<'_> {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn balance(&self) -> Result<Amount, WalletError> {
        if let Some(existing) = self.ledger.read_snapshot(&self.user_id).await? {
            return Ok(existing.amount);
        }
        let initial = self.ledger.default_balance;
        self.ledger.write_snapshot(&self.user_id, initial).await?;
        debug!(user_id = %self.user_id, balance = %initial, "wallet initialised");
        Ok(initial)
    }

    pub async fn set_balance(&self, amount: Amount) -> Result<(), WalletError> {
        self.ledger.write_snapshot(&self.user_id, amount).await
    }

    pub async fn debit(&self, amount: Amount) -> Result<Amount, WalletError> {
        let current = self.balance().await?;
        let Some(updated) = current.checked_sub(amount) else {
            return Err(WalletError::InsufficientBalance {
                available: current,
                requested: amount,
            });
        };
        self.ledger.write_snapshot(&self.user_id, updated).await?;
        debug!(user_id = %self.user_id, debited = %amount, balance = %updated, "wallet debited");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn xof(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn ledger() -> (Arc<WalletLedger>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock(
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        (
            Arc::new(WalletLedger::new(store.clone(), clock, Amount::from(10_000))),
            store,
        )
    }

    #[tokio::test]
    async fn first_read_creates_default_balance() {
        let (ledger, store) = ledger();
        assert!(ledger.snapshot("alice").await.unwrap().is_none());

        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(10_000));

        let raw = store.get("walletBalance:alice").await.unwrap().unwrap();
        let snap: WalletSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snap.amount, Amount::from(10_000));
        assert_eq!(snap.updated_at, "2026-01-01T00:00:00.000Z");
        assert!(raw.contains("updatedAt"));
    }

    #[tokio::test]
    async fn debit_reduces_balance() {
        let (ledger, _) = ledger();
        let left = ledger.debit("alice", Amount::from(50)).await.unwrap();
        assert_eq!(left, Amount::from(9_950));
        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(9_950));
    }

    #[tokio::test]
    async fn debit_to_zero() {
        let (ledger, _) = ledger();
        let left = ledger.debit("alice", Amount::from(10_000)).await.unwrap();
        assert!(left.is_zero());
    }

    #[tokio::test]
    async fn overdraw_rejected_and_balance_unchanged() {
        let (ledger, _) = ledger();
        ledger.set_balance("alice", Amount::from(300)).await.unwrap();

        let err = ledger.debit("alice", xof("300.5")).await.unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                available,
                requested,
            } => {
                assert_eq!(available, Amount::from(300));
                assert_eq!(requested, xof("300.5"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(300));
    }

    #[tokio::test]
    async fn fractional_debits_are_exact() {
        let (ledger, _) = ledger();
        ledger.debit("alice", xof("0.1")).await.unwrap();
        ledger.debit("alice", xof("0.2")).await.unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), xof("9999.7"));

        let raw = ledger.snapshot("alice").await.unwrap().unwrap();
        assert_eq!(raw.amount.to_string(), "9999.7");
    }

    #[tokio::test]
    async fn numeric_snapshot_is_still_readable() {
        let (ledger, store) = ledger();
        store
            .set("walletBalance:alice", r#"{"amount":420,"updatedAt":"x"}"#)
            .await
            .unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(420));
    }

    #[tokio::test]
    async fn corrupt_snapshot_resets_to_default() {
        let (ledger, store) = ledger();
        store.set("walletBalance:alice", "{not json").await.unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(10_000));
    }

    #[tokio::test]
    async fn users_are_independent() {
        let (ledger, _) = ledger();
        ledger.debit("alice", Amount::from(1_000)).await.unwrap();
        assert_eq!(ledger.balance("bob").await.unwrap(), Amount::from(10_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_overdraw() {
        let (ledger, _) = ledger();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.debit("alice", Amount::from(3_000)).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(ledger.balance("alice").await.unwrap(), Amount::from(1_000));
    }

    #[tokio::test]
    async fn guard_sees_consistent_balance() {
        let (ledger, _) = ledger();
        let guard = ledger.lock("alice").await;
        assert_eq!(guard.user_id(), "alice");
        assert_eq!(guard.balance().await.unwrap(), Amount::from(10_000));
        let left = guard.debit(Amount::from(2_500)).await.unwrap();
        assert_eq!(left, Amount::from(7_500));
        assert_eq!(guard.balance().await.unwrap(), Amount::from(7_500));
    }
}

//! # MPIN Gate
//!
//! The MPIN is the short numeric PIN that unlocks the payer's key
//! derivation. It is stored as `SHA-256("<userId>:<pin>")` in hex under
//! `mpin:<userId>`; the cleartext PIN is never persisted.
//!
//! A stored hash means "configured". No hash means the next payment must
//! create one (enter + confirm).

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::{MPIN_KEY_PREFIX, MPIN_MAX_DIGITS, MPIN_MIN_DIGITS};
use crate::crypto::sha256_hex;
use crate::error::PaymentError;
use crate::storage::{KeyValueStore, StorageResult};

/// Check that a PIN is 4 to 6 ASCII digits.
pub fn validate_pin_format(pin: &str) -> Result<(), PaymentError> {
    let len_ok = (MPIN_MIN_DIGITS..=MPIN_MAX_DIGITS).contains(&pin.len());
    if !len_ok || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PaymentError::validation(format!(
            "MPIN must be {} to {} digits",
            MPIN_MIN_DIGITS, MPIN_MAX_DIGITS
        )));
    }
    Ok(())
}

fn key_for_user(user_id: &str) -> String {
    format!("{}{}", MPIN_KEY_PREFIX, user_id)
}

fn hash_mpin(user_id: &str, pin: &str) -> String {
    sha256_hex(format!("{}:{}", user_id, pin).as_bytes())
}

/// Per-user hashed PIN records over a key-value store.
#[derive(Clone)]
pub struct MpinGate {
    store: Arc<dyn KeyValueStore>,
}

impl MpinGate {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Hash and persist, replacing any previous PIN.
    pub async fn store(&self, user_id: &str, pin: &str) -> StorageResult<()> {
        self.store
            .set(&key_for_user(user_id), &hash_mpin(user_id, pin))
            .await?;
        debug!(user_id, "mpin stored");
        Ok(())
    }

    pub async fn exists(&self, user_id: &str) -> StorageResult<bool> {
        let stored = self.store.get(&key_for_user(user_id)).await?;
        Ok(stored.is_some_and(|h| !h.is_empty()))
    }

    /// `false` when no PIN is configured.
    pub async fn verify(&self, user_id: &str, pin: &str) -> StorageResult<bool> {
        let Some(stored) = self.store.get(&key_for_user(user_id)).await? else {
            return Ok(false);
        };
        if stored.is_empty() {
            return Ok(false);
        }
        let candidate = hash_mpin(user_id, pin);
        Ok(stored.as_bytes().ct_eq(candidate.as_bytes()).into())
    }

    /// Forget the PIN (logout).
    pub async fn clear(&self, user_id: &str) -> StorageResult<()> {
        self.store.remove(&key_for_user(user_id)).await?;
        debug!(user_id, "mpin cleared");
        Ok(())
    }
}

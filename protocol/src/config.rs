//! # Protocol Configuration & Constants
//!
//! Every fixed value of the offline handshake lives here: the base currency,
//! the starting wallet balance, storage key namespaces, PIN bounds and the
//! artificial delays that stand in for radio and crypto latency.
//!
//! The tunable subset is gathered in [`SimulationConfig`], which the flow,
//! directory and transport read at construction time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::amount::Amount;

// ---------------------------------------------------------------------------
// Currency & Wallet
// ---------------------------------------------------------------------------

/// ISO 4217 code of the system's base currency (West African CFA franc).
pub const BASE_CURRENCY: &str = "XOF";

/// Balance a wallet starts with the first time it is read.
pub const DEFAULT_BALANCE: u64 = 10_000;

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// Domain-separation suffix appended to every derivation context.
pub const DERIVATION_DOMAIN: &str = "proxipay";

/// Separator between the fields of a derivation context.
pub const DERIVATION_SEPARATOR: char = '|';

// ---------------------------------------------------------------------------
// Storage Keys
// ---------------------------------------------------------------------------

/// Prefix for per-user MPIN hashes: `mpin:<userId>`.
pub const MPIN_KEY_PREFIX: &str = "mpin:";

/// Prefix for per-user wallet snapshots: `walletBalance:<userId>`.
pub const WALLET_KEY_PREFIX: &str = "walletBalance:";

/// Key holding the whole offline transaction sequence (blob store).
pub const OFFLINE_TRANSACTIONS_KEY: &str = "offlineTransactions";

// ---------------------------------------------------------------------------
// MPIN
// ---------------------------------------------------------------------------

pub const MPIN_MIN_DIGITS: usize = 4;
pub const MPIN_MAX_DIGITS: usize = 6;

// ---------------------------------------------------------------------------
// Record Status
// ---------------------------------------------------------------------------

/// Status string carried by every offline record until reconciliation.
pub const STATUS_STORED_OFFLINE: &str = "STOREDOFFLINE";

// ---------------------------------------------------------------------------
// Identifier Prefixes
// ---------------------------------------------------------------------------

pub const PAYLOAD_ID_PREFIX: &str = "txn";
pub const ACK_ID_PREFIX: &str = "ack";
pub const RECORD_ID_PREFIX: &str = "offline";
pub const NONCE_PREFIX: &str = "nonce";

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Unused session nonces a vendor keeps open. Past this, the oldest expires.
pub const SESSION_WINDOW: usize = 64;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Simulated scan time before advertisements are returned.
pub const DISCOVERY_DELAY: Duration = Duration::from_millis(300);

/// Simulated time to unlock the payer key after the MPIN check.
pub const UNLOCK_DELAY: Duration = Duration::from_millis(120);

/// Simulated round trip of the payload/ack exchange.
pub const EXCHANGE_DELAY: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Signal Model
// ---------------------------------------------------------------------------

/// Signal strength jitter is drawn from `[-SIGNAL_JITTER, SIGNAL_JITTER)` dBm.
pub const SIGNAL_JITTER: i32 = 4;

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Tunables for a running wallet.
///
/// `Default` reproduces the constants above. Tests use
/// [`SimulationConfig::instant`] to skip the artificial delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub default_balance: Amount,
    #[serde(with = "millis")]
    pub discovery_delay: Duration,
    #[serde(with = "millis")]
    pub unlock_delay: Duration,
    #[serde(with = "millis")]
    pub exchange_delay: Duration,
    pub signal_jitter: i32,
    pub session_window: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_balance: Amount::from(DEFAULT_BALANCE),
            discovery_delay: DISCOVERY_DELAY,
            unlock_delay: UNLOCK_DELAY,
            exchange_delay: EXCHANGE_DELAY,
            signal_jitter: SIGNAL_JITTER,
            session_window: SESSION_WINDOW,
        }
    }
}

impl SimulationConfig {
    /// Same as the default, with every delay set to zero.
    pub fn instant() -> Self {
        Self {
            discovery_delay: Duration::ZERO,
            unlock_delay: Duration::ZERO,
            exchange_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Durations as integer milliseconds in config files.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

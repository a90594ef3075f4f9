//! # Vendor Discovery
//!
//! Simulated proximity discovery. Each call to [`VendorDirectory::discover`]
//! produces one fresh batch of [`VendorAdvertisement`]s:
//!
//! - a new session nonce per vendor, registered in the [`SessionBook`] so the
//!   vendor side can later check that a payload answers one of its
//!   advertisements;
//! - the vendor's long-lived key and certificate from the
//!   [`VendorKeyRepository`], derived once per vendor id and reused;
//! - a signal strength sampled around the vendor's baseline.
//!
//! The directory plays both the scanner and the advertising vendors, so it
//! owns the vendor key material and the responder borrows it through an
//! `Arc<VendorDirectory>`.
//!
//! ## Key Derivation Risk
//!
//! Vendor keys are derived from `vendor|<id>|<profileHash>|proxipay`. Anyone
//! who knows a vendor's id and profile hash can recompute its private key.
//! This is acceptable only for the simulation; a real vendor holds a key
//! generated from device entropy.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::IdGenerator;
use crate::config::{SimulationConfig, NONCE_PREFIX, SESSION_WINDOW};
use crate::crypto::{derive, DerivationContext, KeyMaterial};
use crate::exchange::ExchangeError;

/// Static description of a vendor the simulation can advertise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorBlueprint {
    pub id: String,
    pub receiver_id: String,
    pub profile_hash: String,
    pub short_code: String,
    /// dBm.
    pub base_signal_strength: i32,
}

impl VendorBlueprint {
    pub fn new(
        id: &str,
        receiver_id: &str,
        profile_hash: &str,
        short_code: &str,
        base_signal_strength: i32,
    ) -> Self {
        Self {
            id: id.to_string(),
            receiver_id: receiver_id.to_string(),
            profile_hash: profile_hash.to_string(),
            short_code: short_code.to_string(),
            base_signal_strength,
        }
    }
}

/// The two sample vendors every wallet can see.
pub fn default_blueprints() -> Vec<VendorBlueprint> {
    vec![
        VendorBlueprint::new("vendor-bridge", "RX-4421", "a1b2c3", "441", -48),
        VendorBlueprint::new("vendor-cafe", "RX-2294", "f0e1d2", "229", -60),
    ]
}

/// What a payer sees for one vendor in one discovery cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorAdvertisement {
    pub id: String,
    pub receiver_id: String,
    /// Single use. A payload must carry it unchanged.
    pub session_nonce: String,
    pub profile_hash: String,
    pub short_code: String,
    pub signal_strength: i32,
    pub vendor_public_key: String,
    pub certificate: String,
}

/// Vendor key material, derived on first use and cached by vendor id.
#[derive(Debug, Default)]
pub struct VendorKeyRepository {
    keys: DashMap<String, Arc<KeyMaterial>>,
}

impl VendorKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_derive(&self, blueprint: &VendorBlueprint) -> Arc<KeyMaterial> {
        self.keys
            .entry(blueprint.id.clone())
            .or_insert_with(|| {
                debug!(vendor_id = %blueprint.id, "deriving vendor key material");
                let context = DerivationContext::vendor(&blueprint.id, &blueprint.profile_hash);
                Arc::new(derive(&context, &blueprint.receiver_id))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Session nonces each vendor has advertised and not yet accepted.
///
/// Every discovery adds one nonce per vendor, so payers that scanned at
/// different times can all pay. A successful exchange consumes exactly the
/// nonce it presented. Each vendor keeps at most `window` open nonces; when
/// a new one would exceed that, the oldest expires.
#[derive(Debug)]
pub struct SessionBook {
    issued: DashMap<String, VecDeque<String>>,
    window: usize,
}

impl Default for SessionBook {
    fn default() -> Self {
        Self::new(SESSION_WINDOW)
    }
}

impl SessionBook {
    pub fn new(window: usize) -> Self {
        Self {
            issued: DashMap::new(),
            window: window.max(1),
        }
    }

    pub fn issue(&self, vendor_id: &str, nonce: &str) {
        let mut open = self.issued.entry(vendor_id.to_string()).or_default();
        open.push_back(nonce.to_string());
        while open.len() > self.window {
            if let Some(expired) = open.pop_front() {
                debug!(vendor_id, nonce = %expired, "session nonce expired");
            }
        }
    }

    /// Whether `nonce` is still accepted for `vendor_id`.
    pub fn is_open(&self, vendor_id: &str, nonce: &str) -> bool {
        self.issued
            .get(vendor_id)
            .map_or(false, |open| open.iter().any(|n| n == nonce))
    }

    pub fn open_count(&self, vendor_id: &str) -> usize {
        self.issued.get(vendor_id).map_or(0, |open| open.len())
    }

    /// Accept `nonce` for `vendor_id` exactly once.
    pub fn consume(&self, vendor_id: &str, nonce: &str) -> Result<(), ExchangeError> {
        let consumed = self.issued.get_mut(vendor_id).and_then(|mut open| {
            let position = open.iter().position(|n| n == nonce)?;
            open.remove(position)
        });
        match consumed {
            Some(_) => Ok(()),
            None => Err(ExchangeError::SessionMismatch(format!(
                "nonce {} is not an open session for {}",
                nonce, vendor_id
            ))),
        }
    }
}

/// Order nearest-first by signal strength, ascending.
pub fn sort_by_proximity(adverts: &mut [VendorAdvertisement]) {
    adverts.sort_by_key(|a| a.signal_strength);
}

pub struct VendorDirectory {
    blueprints: Vec<VendorBlueprint>,
    keys: VendorKeyRepository,
    sessions: SessionBook,
    ids: Arc<dyn IdGenerator>,
    discovery_delay: Duration,
    signal_jitter: i32,
}

impl VendorDirectory {
    pub fn new(
        blueprints: Vec<VendorBlueprint>,
        ids: Arc<dyn IdGenerator>,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            blueprints,
            keys: VendorKeyRepository::new(),
            sessions: SessionBook::new(config.session_window),
            ids,
            discovery_delay: config.discovery_delay,
            signal_jitter: config.signal_jitter.max(0),
        }
    }

    /// A directory advertising [`default_blueprints`].
    pub fn with_defaults(ids: Arc<dyn IdGenerator>, config: &SimulationConfig) -> Self {
        Self::new(default_blueprints(), ids, config)
    }

    /// Scan for vendors. Returns the batch sorted by proximity.
    pub async fn discover(&self) -> Vec<VendorAdvertisement> {
        if !self.discovery_delay.is_zero() {
            tokio::time::sleep(self.discovery_delay).await;
        }

        let mut adverts: Vec<_> = self.blueprints.iter().map(|bp| self.advertise(bp)).collect();
        sort_by_proximity(&mut adverts);

        info!(count = adverts.len(), "vendors discovered");
        adverts
    }

    fn advertise(&self, blueprint: &VendorBlueprint) -> VendorAdvertisement {
        let keys = self.keys.get_or_derive(blueprint);
        let nonce = self.ids.next_id(NONCE_PREFIX);
        self.sessions.issue(&blueprint.id, &nonce);

        let jitter = if self.signal_jitter > 0 {
            rand::thread_rng().gen_range(-self.signal_jitter..self.signal_jitter)
        } else {
            0
        };

        VendorAdvertisement {
            id: blueprint.id.clone(),
            receiver_id: blueprint.receiver_id.clone(),
            session_nonce: nonce,
            profile_hash: blueprint.profile_hash.clone(),
            short_code: blueprint.short_code.clone(),
            signal_strength: blueprint.base_signal_strength + jitter,
            vendor_public_key: keys.public_key_hex().to_string(),
            certificate: keys.certificate_hex().to_string(),
        }
    }

    pub fn blueprint(&self, vendor_id: &str) -> Option<&VendorBlueprint> {
        self.blueprints.iter().find(|bp| bp.id == vendor_id)
    }

    pub fn keys(&self) -> &VendorKeyRepository {
        &self.keys
    }

    pub fn sessions(&self) -> &SessionBook {
        &self.sessions
    }
}

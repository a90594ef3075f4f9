//! # Transaction Payload
//!
//! The payer's half of the exchange. A [`TransactionPayload`] is built once,
//! signed once and never touched again; the vendor verifies the signature
//! against the `payerPublicKey` carried inside the payload itself.
//!
//! ## Canonical Form
//!
//! The signed message is the payload serialized as compact JSON with
//! camelCase field names in declaration order:
//!
//! ```text
//! {"payloadId":..,"amount":..,"currency":..,"payerId":..,"payerPublicKey":..,
//!  ["payerName":..,] "vendorId":..,"sessionNonce":..,"timestamp":..,"certificate":..}
//! ```
//!
//! `amount` is a normalised decimal string (`"12.5"`). `payerName` is left
//! out entirely when absent. The signature field is never part of the
//! message.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::Amount;
use crate::clock::{Clock, IdGenerator};
use crate::config::{BASE_CURRENCY, PAYLOAD_ID_PREFIX};
use crate::crypto::{sign_hex, verify_hex, KeyMaterial};
use crate::discovery::VendorAdvertisement;
use crate::error::{PaymentError, PaymentResult};

use super::ExchangeError;

/// The fields the payer signs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub payload_id: String,
    /// In units of `currency`.
    pub amount: Amount,
    pub currency: String,
    pub payer_id: String,
    pub payer_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,
    /// The vendor's receiver id, not its advertisement id.
    pub vendor_id: String,
    pub session_nonce: String,
    pub timestamp: String,
    /// The payer's certificate.
    pub certificate: String,
}

impl TransactionPayload {
    /// The exact bytes covered by the payer's signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ExchangeError> {
        serde_json::to_vec(self).map_err(|e| ExchangeError::Encoding(e.to_string()))
    }
}

/// A payload plus the payer's hex signature over its canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(flatten)]
    pub payload: TransactionPayload,
    pub signature: String,
}

impl SignedPayload {
    /// Recompute the canonical body and check it against `payerPublicKey`.
    pub fn verify_signature(&self) -> bool {
        match self.payload.signing_bytes() {
            Ok(message) => verify_hex(&self.payload.payer_public_key, &message, &self.signature),
            Err(_) => false,
        }
    }
}

/// Build a payload for `vendor` and sign it with the payer's key.
///
/// The session nonce is copied from the advertisement unchanged, and
/// `vendorId` is the advertisement's receiver id.
///
/// # Errors
///
/// [`PaymentError::Validation`] for a zero amount.
pub fn build_and_sign(
    vendor: &VendorAdvertisement,
    amount: Amount,
    payer_id: &str,
    payer_name: Option<&str>,
    key_material: &KeyMaterial,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
) -> PaymentResult<SignedPayload> {
    if amount.is_zero() {
        return Err(PaymentError::validation("amount must be greater than zero"));
    }

    let payload = TransactionPayload {
        payload_id: ids.next_id(PAYLOAD_ID_PREFIX),
        amount,
        currency: BASE_CURRENCY.to_string(),
        payer_id: payer_id.to_string(),
        payer_public_key: key_material.public_key_hex().to_string(),
        payer_name: payer_name
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        vendor_id: vendor.receiver_id.clone(),
        session_nonce: vendor.session_nonce.clone(),
        timestamp: clock.now_iso(),
        certificate: key_material.certificate_hex().to_string(),
    };

    let message = payload.signing_bytes()?;
    let signature = sign_hex(key_material.keypair(), &message);

    debug!(
        payload_id = %payload.payload_id,
        vendor_id = %payload.vendor_id,
        %amount,
        "payload signed"
    );

    Ok(SignedPayload { payload, signature })
}

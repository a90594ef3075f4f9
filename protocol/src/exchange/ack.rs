//! # Vendor Acknowledgement
//!
//! The vendor's signed proof that it accepted a payload. The signature covers
//! only the [`AckBody`] (`ackId`, `payloadId`, `vendorId`, `sessionNonce`,
//! `timestamp`, in that order); the key and certificate travel alongside so
//! the payer can compare them with what was advertised.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::{sign_hex, verify_hex, KeyMaterial};
use crate::discovery::VendorAdvertisement;

use super::ExchangeError;

/// The signed part of an acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckBody {
    pub ack_id: String,
    pub payload_id: String,
    /// The vendor's receiver id.
    pub vendor_id: String,
    pub session_nonce: String,
    pub timestamp: String,
}

impl AckBody {
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ExchangeError> {
        serde_json::to_vec(self).map_err(|e| ExchangeError::Encoding(e.to_string()))
    }

    /// Sign with the vendor's key material and attach its public key and
    /// certificate.
    pub fn sign(self, vendor_keys: &KeyMaterial) -> Result<AckPayload, ExchangeError> {
        let signature = sign_hex(vendor_keys.keypair(), &self.signing_bytes()?);
        Ok(AckPayload {
            body: self,
            signature,
            vendor_public_key: vendor_keys.public_key_hex().to_string(),
            certificate: vendor_keys.certificate_hex().to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    #[serde(flatten)]
    pub body: AckBody,
    pub signature: String,
    pub vendor_public_key: String,
    pub certificate: String,
}

impl AckPayload {
    pub fn ack_id(&self) -> &str {
        &self.body.ack_id
    }
}

/// Check an acknowledgement against the advertisement it answers.
///
/// The checks run in a fixed order and stop at the first failure:
/// advertised key, advertised certificate, then the signature under the
/// advertised key.
pub fn verify_ack(ack: &AckPayload, vendor: &VendorAdvertisement) -> Result<(), ExchangeError> {
    if ack.vendor_public_key != vendor.vendor_public_key {
        warn!(vendor_id = %vendor.id, "ack signed by an unadvertised key");
        return Err(ExchangeError::KeyMismatch);
    }
    if ack.certificate != vendor.certificate {
        warn!(vendor_id = %vendor.id, "ack carries an unadvertised certificate");
        return Err(ExchangeError::CertificateMismatch);
    }

    let message = ack.body.signing_bytes()?;
    if !verify_hex(&vendor.vendor_public_key, &message, &ack.signature) {
        warn!(vendor_id = %vendor.id, ack_id = %ack.body.ack_id, "ack signature rejected");
        return Err(ExchangeError::SignatureInvalid(
            "invalid ACK signature from vendor".into(),
        ));
    }
    Ok(())
}

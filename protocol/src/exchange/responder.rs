//! # Vendor Responder
//!
//! The vendor's side of the exchange. Given a signed payload addressed to one
//! of the directory's vendors, it either returns a signed acknowledgement or
//! refuses. Nothing is signed for a payload that fails a check.
//!
//! Checks, in order:
//!
//! 1. the payer signature verifies under the payload's own `payerPublicKey`;
//! 2. the vendor exists and the payload's `vendorId` is its receiver id;
//! 3. the session nonce is one the vendor advertised and has not accepted
//!    yet. It is consumed here, so a replayed payload is refused.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{Clock, IdGenerator};
use crate::config::ACK_ID_PREFIX;
use crate::discovery::VendorDirectory;

use super::ack::{AckBody, AckPayload};
use super::payload::SignedPayload;
use super::transport::ExchangeMessage;
use super::ExchangeError;

#[derive(Clone)]
pub struct VendorResponder {
    directory: Arc<VendorDirectory>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl VendorResponder {
    pub fn new(
        directory: Arc<VendorDirectory>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            directory,
            clock,
            ids,
        }
    }

    /// Answer a payment request addressed to advertisement `vendor_id`.
    pub fn respond(
        &self,
        vendor_id: &str,
        signed: &SignedPayload,
    ) -> Result<AckPayload, ExchangeError> {
        let payload = &signed.payload;

        if !signed.verify_signature() {
            warn!(vendor_id, payload_id = %payload.payload_id, "payload signature rejected");
            return Err(ExchangeError::SignatureInvalid(
                "vendor rejected payload signature".into(),
            ));
        }

        let blueprint = self
            .directory
            .blueprint(vendor_id)
            .ok_or_else(|| ExchangeError::UnknownVendor(vendor_id.to_string()))?;

        if payload.vendor_id != blueprint.receiver_id {
            warn!(
                vendor_id,
                addressed_to = %payload.vendor_id,
                "payload addressed to another receiver"
            );
            return Err(ExchangeError::SessionMismatch(format!(
                "payload addressed to {}, not {}",
                payload.vendor_id, blueprint.receiver_id
            )));
        }

        if let Err(e) = self
            .directory
            .sessions()
            .consume(&blueprint.id, &payload.session_nonce)
        {
            warn!(vendor_id, payload_id = %payload.payload_id, "stale or replayed session nonce");
            return Err(e);
        }

        let keys = self.directory.keys().get_or_derive(blueprint);
        let ack = AckBody {
            ack_id: self.ids.next_id(ACK_ID_PREFIX),
            payload_id: payload.payload_id.clone(),
            vendor_id: blueprint.receiver_id.clone(),
            session_nonce: payload.session_nonce.clone(),
            timestamp: self.clock.now_iso(),
        }
        .sign(&keys)?;

        info!(
            vendor_id,
            payload_id = %payload.payload_id,
            ack_id = %ack.body.ack_id,
            amount = %payload.amount,
            "payment acknowledged"
        );
        Ok(ack)
    }

    /// Turn one inbound message into the reply that goes back on the wire.
    pub fn handle(&self, message: ExchangeMessage) -> ExchangeMessage {
        match message {
            ExchangeMessage::PaymentRequest { vendor_id, payload } => {
                match self.respond(&vendor_id, &payload) {
                    Ok(ack) => ExchangeMessage::Acknowledgement(ack),
                    Err(e) => ExchangeMessage::Rejection(e.into()),
                }
            }
            other => ExchangeMessage::Rejection(super::Rejection::Unexpected(format!(
                "responder cannot handle {}",
                other.kind()
            ))),
        }
    }
}

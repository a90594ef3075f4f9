//! The payer's end of the exchange.

use std::sync::Arc;

use tracing::debug;

use crate::discovery::VendorAdvertisement;

use super::ack::AckPayload;
use super::payload::SignedPayload;
use super::transport::{ExchangeMessage, Transport};
use super::ExchangeError;

#[derive(Clone)]
pub struct PayerSession {
    transport: Arc<dyn Transport>,
}

impl PayerSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `signed` to `vendor` and wait for the acknowledgement.
    ///
    /// The returned ack is not yet trusted; pass it to
    /// [`verify_ack`](super::verify_ack).
    pub async fn exchange(
        &self,
        signed: &SignedPayload,
        vendor: &VendorAdvertisement,
    ) -> Result<AckPayload, ExchangeError> {
        debug!(vendor_id = %vendor.id, payload_id = %signed.payload.payload_id, "sending payment request");

        let reply = self
            .transport
            .send(ExchangeMessage::PaymentRequest {
                vendor_id: vendor.id.clone(),
                payload: signed.clone(),
            })
            .await?;

        match reply {
            ExchangeMessage::Acknowledgement(ack) => Ok(ack),
            ExchangeMessage::Rejection(reason) => Err(reason.into()),
            other => Err(ExchangeError::Transport(format!(
                "expected an acknowledgement, got {}",
                other.kind()
            ))),
        }
    }
}

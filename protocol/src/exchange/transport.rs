//! # Exchange Transport
//!
//! The message boundary between payer and vendor. Messages are JSON frames:
//!
//! ```text
//! {"type":"paymentRequest","body":{"vendorId":..,"payload":{..}}}
//! {"type":"acknowledgement","body":{..}}
//! {"type":"rejection","body":{"kind":"signatureInvalid","detail":".."}}
//! ```
//!
//! [`LoopbackTransport`] keeps both ends in one process: the responder runs
//! on its own tokio task, frames travel over an mpsc channel and each reply
//! comes back on a oneshot. The configured exchange delay stands in for
//! radio latency.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::ack::AckPayload;
use super::payload::SignedPayload;
use super::responder::VendorResponder;
use super::ExchangeError;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ExchangeMessage {
    #[serde(rename_all = "camelCase")]
    PaymentRequest {
        /// Advertisement id of the vendor being paid.
        vendor_id: String,
        payload: SignedPayload,
    },
    Acknowledgement(AckPayload),
    Rejection(Rejection),
}

impl ExchangeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeMessage::PaymentRequest { .. } => "paymentRequest",
            ExchangeMessage::Acknowledgement(_) => "acknowledgement",
            ExchangeMessage::Rejection(_) => "rejection",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ExchangeError> {
        serde_json::to_vec(self).map_err(|e| ExchangeError::Encoding(e.to_string()))
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ExchangeError> {
        serde_json::from_slice(frame)
            .map_err(|e| ExchangeError::Transport(format!("malformed frame: {}", e)))
    }
}

/// Why a vendor refused a payment request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum Rejection {
    SignatureInvalid(String),
    SessionMismatch(String),
    UnknownVendor(String),
    /// Anything else, including a message the vendor did not expect.
    Unexpected(String),
}

impl From<ExchangeError> for Rejection {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::SignatureInvalid(msg) => Rejection::SignatureInvalid(msg),
            ExchangeError::SessionMismatch(msg) => Rejection::SessionMismatch(msg),
            ExchangeError::UnknownVendor(id) => Rejection::UnknownVendor(id),
            other => Rejection::Unexpected(other.to_string()),
        }
    }
}

impl From<Rejection> for ExchangeError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::SignatureInvalid(msg) => ExchangeError::SignatureInvalid(msg),
            Rejection::SessionMismatch(msg) => ExchangeError::SessionMismatch(msg),
            Rejection::UnknownVendor(id) => ExchangeError::UnknownVendor(id),
            Rejection::Unexpected(msg) => ExchangeError::Transport(msg),
        }
    }
}

/// Carries one request to the vendor and returns its reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: ExchangeMessage) -> Result<ExchangeMessage, ExchangeError>;
}

struct Envelope {
    frame: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

/// In-process transport backed by a responder task.
pub struct LoopbackTransport {
    tx: mpsc::Sender<Envelope>,
    delay: Duration,
}

impl LoopbackTransport {
    /// Spawn the responder task. Must be called inside a tokio runtime.
    ///
    /// The task ends when the transport is dropped.
    pub fn spawn(responder: VendorResponder, delay: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let reply = match ExchangeMessage::decode(&envelope.frame) {
                    Ok(message) => responder.handle(message),
                    Err(e) => ExchangeMessage::Rejection(Rejection::Unexpected(e.to_string())),
                };
                match reply.encode() {
                    Ok(frame) => {
                        let _ = envelope.reply.send(frame);
                    }
                    Err(e) => warn!(error = %e, "responder reply could not be encoded"),
                }
            }
            debug!("loopback responder stopped");
        });

        Self { tx, delay }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, message: ExchangeMessage) -> Result<ExchangeMessage, ExchangeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let frame = message.encode()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ExchangeError::Transport("responder is gone".into()))?;

        let reply = reply_rx
            .await
            .map_err(|_| ExchangeError::Transport("responder dropped the request".into()))?;
        ExchangeMessage::decode(&reply)
    }
}

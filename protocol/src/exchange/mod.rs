//! # Offline Payment Exchange
//!
//! The payer and the vendor never talk to a backend. Everything the vendor
//! needs to accept a payment travels in one signed payload, and everything
//! the payer needs to prove acceptance comes back in one signed
//! acknowledgement.
//!
//! ```text
//!   ┌──────────┐                                   ┌──────────┐
//!   │  Payer   │                                   │  Vendor  │
//!   └────┬─────┘                                   └────┬─────┘
//!        │                                              │
//!        │  0. VendorAdvertisement (key, cert, nonce)   │
//!        │◄─────────────────────────────────────────────┤
//!        │                                              │
//!        │  1. PaymentRequest (SignedPayload)           │
//!        ├─────────────────────────────────────────────►│
//!        │                      verify payer signature  │
//!        │                      consume session nonce   │
//!        │                                              │
//!        │  2. Acknowledgement (AckPayload)             │
//!        │◄─────────────────────────────────────────────┤
//!        │                                              │
//!   verify vendor key, certificate and ack signature    │
//! ```
//!
//! ### Payload (`payload.rs`)
//! The payer builds a [`TransactionPayload`] bound to the advertised
//! session nonce and signs its canonical JSON form.
//!
//! ### Responder (`responder.rs`)
//! The vendor side. Rejects a bad signature or a stale/foreign session
//! before signing anything.
//!
//! ### Acknowledgement (`ack.rs`)
//! The vendor's signed receipt and the payer-side checks against the
//! advertisement the payer saw during discovery.
//!
//! ### Transport (`transport.rs`, `payer.rs`)
//! Messages cross a [`Transport`]. [`LoopbackTransport`] runs the responder
//! on its own task and passes JSON frames over channels; a radio transport
//! would plug in at the same seam.

pub mod ack;
pub mod payer;
pub mod payload;
pub mod responder;
pub mod transport;

mod error;

pub use ack::{verify_ack, AckBody, AckPayload};
pub use error::ExchangeError;
pub use payer::PayerSession;
pub use payload::{build_and_sign, SignedPayload, TransactionPayload};
pub use responder::VendorResponder;
pub use transport::{ExchangeMessage, LoopbackTransport, Rejection, Transport};

// Copyright (c) 2026 ProxiPay Contributors. MIT License.
// See LICENSE for details.

//! # ProxiPay Protocol — Core Library
//!
//! Offline, peer-to-peer payments between a payer's phone and a nearby
//! vendor, with no backend in the loop. The payer signs a payment bound to
//! the vendor's advertised session, the vendor signs an acknowledgement, and
//! the payer keeps both as an offline record to reconcile later.
//!
//! Ed25519 for both signature legs, SHA-512/SHA-256 for key derivation and
//! certificates, sled for anything that has to survive a restart.
//!
//! ## Architecture
//!
//! - **crypto** — Keypairs, hashing and deterministic key derivation.
//! - **discovery** — Simulated vendor advertisements, vendor keys and session nonces.
//! - **mpin** — Hashed PIN records that gate the payer's key.
//! - **exchange** — Signed payloads, vendor acknowledgements and the transport between them.
//! - **wallet** — Per-user balance with locked read-modify-write.
//! - **ledger** — Append-only offline transaction records.
//! - **flow** — The payment state machine tying it all together.
//! - **storage** — Key-value contract over memory or sled.
//! - **amount** — Exact non-negative decimal money.
//! - **config**, **clock**, **error** — Constants, time and id sources, error types.
//!
//! ## Ground Rules
//!
//! 1. Nothing is recorded or debited unless both signatures verified.
//! 2. The MPIN and private keys never touch storage or logs.
//! 3. A balance cannot go below zero, even under concurrent payments.

pub mod amount;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod ledger;
pub mod mpin;
pub mod storage;
pub mod wallet;

pub use amount::Amount;
pub use error::{PaymentError, PaymentResult};
pub use flow::{PaymentFlow, PaymentForm, PaymentOutcome, PaymentProgress, PaymentServices};

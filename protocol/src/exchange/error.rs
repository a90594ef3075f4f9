//! Errors raised on either side of the exchange.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// A payload or acknowledgement signature did not verify.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// The ack was signed with a key other than the advertised one.
    #[error("vendor key mismatch detected")]
    KeyMismatch,

    /// The ack carries a certificate other than the advertised one.
    #[error("vendor certificate mismatch detected")]
    CertificateMismatch,

    /// The payload names a vendor or session nonce the responder did not
    /// issue, or one that was already used.
    #[error("session mismatch: {0}")]
    SessionMismatch(String),

    #[error("unknown vendor: {0}")]
    UnknownVendor(String),

    /// Canonical signing bytes could not be produced.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The message never made it across, or the reply was unreadable.
    #[error("transport error: {0}")]
    Transport(String),
}

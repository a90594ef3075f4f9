//! Error type for the payment flow.
//!
//! Every failure the orchestrator can surface is a [`PaymentError`]. Module
//! level errors ([`ExchangeError`], [`WalletError`], [`StorageError`]) convert
//! into it so the kinds a user sees stay the same whichever layer failed.
//! All of them are recoverable: the flow returns to the details step and the
//! user may resubmit.

use thiserror::Error;

use crate::amount::Amount;
use crate::exchange::ExchangeError;
use crate::storage::StorageError;
use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed amount, PIN, confirmation or payer profile.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient wallet balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    /// The MPIN was well formed but does not match the stored hash.
    #[error("incorrect MPIN entered")]
    IncorrectMpin,

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("vendor key mismatch detected")]
    KeyMismatch,

    #[error("vendor certificate mismatch detected")]
    CertificateMismatch,

    /// The payload's session nonce or vendor id is not the one the vendor
    /// advertised.
    #[error("session mismatch: {0}")]
    SessionMismatch(String),

    /// Any other failure of the exchange (unknown vendor, transport down).
    #[error("exchange failed: {0}")]
    Exchange(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An operation was called in a flow state that does not allow it.
    #[error("invalid state: cannot {action} while in {state}")]
    InvalidState { state: String, action: String },
}

impl PaymentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PaymentError::Validation(msg.into())
    }
}

impl From<ExchangeError> for PaymentError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::SignatureInvalid(msg) => PaymentError::SignatureInvalid(msg),
            ExchangeError::KeyMismatch => PaymentError::KeyMismatch,
            ExchangeError::CertificateMismatch => PaymentError::CertificateMismatch,
            ExchangeError::SessionMismatch(msg) => PaymentError::SessionMismatch(msg),
            other => PaymentError::Exchange(other.to_string()),
        }
    }
}

impl From<WalletError> for PaymentError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientBalance {
                available,
                requested,
            } => PaymentError::InsufficientBalance {
                available,
                requested,
            },
            WalletError::Storage(inner) => PaymentError::Storage(inner),
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_kinds_are_preserved() {
        assert!(matches!(
            PaymentError::from(ExchangeError::KeyMismatch),
            PaymentError::KeyMismatch
        ));
        assert!(matches!(
            PaymentError::from(ExchangeError::CertificateMismatch),
            PaymentError::CertificateMismatch
        ));
        assert!(matches!(
            PaymentError::from(ExchangeError::SignatureInvalid("payload".into())),
            PaymentError::SignatureInvalid(_)
        ));
        assert!(matches!(
            PaymentError::from(ExchangeError::UnknownVendor("v".into())),
            PaymentError::Exchange(_)
        ));
    }

    #[test]
    fn wallet_shortfall_maps_to_insufficient_balance() {
        let err = PaymentError::from(WalletError::InsufficientBalance {
            available: Amount::from(10_000),
            requested: "15000.5".parse().unwrap(),
        });
        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert!(err.to_string().contains("available 10000, requested 15000.5"));
    }
}

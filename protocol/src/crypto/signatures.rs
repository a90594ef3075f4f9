//! # Digital Signatures
//!
//! Sign and verify helpers for the hex-encoded keys and signatures that
//! appear on payment payloads and acknowledgements.
//!
//! Verification answers yes or no. It does not say whether the key, the
//! signature encoding or the signature itself was at fault.

use super::keys::{Keypair, PublicKey, Signature};

/// Sign a message and return the signature.
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify a signature against a public key.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Sign and hex-encode in one step, for building wire messages.
pub fn sign_hex(keypair: &Keypair, message: &[u8]) -> String {
    sign(keypair, message).to_hex()
}

/// Verify a hex signature against a hex public key.
///
/// Malformed hex on either side is a failed verification, not an error.
pub fn verify_hex(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(public_key) = PublicKey::from_hex(public_key_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_hex(signature_hex) else {
        return false;
    };
    verify(&public_key, message, &signature)
}

//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-512** — the wide hash. Seeds for deterministic key derivation are
//!   the first 32 bytes of a SHA-512 digest.
//! - **SHA-256** — the narrow hash. Certificates (identity bound to a public
//!   key) and MPIN records are SHA-256 digests, stored as lowercase hex.

use sha2::{Digest, Sha256, Sha512};

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 over several byte strings, concatenated in order.
///
/// Equivalent to hashing the concatenation, without allocating it.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// SHA-256 as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// SHA-512 digest. 64 bytes.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First 32 bytes of SHA-512(data), used directly as an Ed25519 seed.
pub fn seed_from(data: &[u8]) -> [u8; 32] {
    let wide = sha512(data);
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&wide[..32]);
    seed
}

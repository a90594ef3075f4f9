//! # Cryptographic Primitives
//!
//! Everything the handshake signs, hashes or derives goes through here:
//!
//! - **Ed25519** (`ed25519-dalek`) for payload and acknowledgement signatures.
//! - **SHA-512** for derivation seeds, **SHA-256** for certificates and MPIN
//!   hashes (`sha2`).
//! - Deterministic key derivation from a role, an identity and a secret.

pub mod derivation;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use derivation::{derive, derive_key_material, DerivationContext, KeyMaterial, Role};
pub use hash::{seed_from, sha256, sha256_hex, sha512};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{sign, sign_hex, verify, verify_hex};

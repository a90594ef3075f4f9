//! # Deterministic Key Derivation
//!
//! Both parties of the handshake derive their Ed25519 keys from short
//! strings instead of storing key material:
//!
//! ```text
//! context     = "<role>|<identity>|<secret>|proxipay"
//! seed        = SHA-512(context)[0..32]
//! public_key  = Ed25519(seed)
//! certificate = SHA-256(subject || public_key)
//! ```
//!
//! The payer's secret is the MPIN; a vendor's secret is its profile hash.
//! The certificate binds an identity string to the public key without a PKI.
//!
//! ## Security considerations
//!
//! A 4-6 digit PIN gives at most 10^6 candidate seeds. Anyone who learns the
//! payer id and sees one signature can brute-force the key offline. This
//! derivation exists so the simulation is reproducible. Production keys need
//! a high-entropy secret or hardware-backed storage.

use std::fmt;

use crate::config::{DERIVATION_DOMAIN, DERIVATION_SEPARATOR};

use super::hash::{seed_from, sha256_concat};
use super::keys::Keypair;

/// Which side of the handshake a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Payer,
    Vendor,
}

impl Role {
    pub fn tag(self) -> &'static str {
        match self {
            Role::Payer => "payer",
            Role::Vendor => "vendor",
        }
    }
}

/// The inputs of one derivation.
///
/// The `secret` never leaves this struct except through
/// [`DerivationContext::to_context_string`], and `Debug` redacts it.
#[derive(Clone)]
pub struct DerivationContext {
    role: Role,
    identity: String,
    secret: String,
}

impl DerivationContext {
    /// Payer context: identity is the user id, secret is the MPIN.
    pub fn payer(payer_id: &str, pin: &str) -> Self {
        Self {
            role: Role::Payer,
            identity: payer_id.to_string(),
            secret: pin.to_string(),
        }
    }

    /// Vendor context: identity is the vendor id, secret is its profile hash.
    pub fn vendor(vendor_id: &str, profile_hash: &str) -> Self {
        Self {
            role: Role::Vendor,
            identity: vendor_id.to_string(),
            secret: profile_hash.to_string(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn to_context_string(&self) -> String {
        let sep = DERIVATION_SEPARATOR;
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.role.tag(),
            self.identity,
            self.secret,
            DERIVATION_DOMAIN
        )
    }
}

impl fmt::Debug for DerivationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DerivationContext({}, {}, <redacted>)",
            self.role.tag(),
            self.identity
        )
    }
}

/// A derived keypair plus its certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    keypair: Keypair,
    public_key_hex: String,
    certificate_hex: String,
}

impl KeyMaterial {
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn certificate_hex(&self) -> &str {
        &self.certificate_hex
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key_hex)
            .field("certificate", &self.certificate_hex)
            .finish_non_exhaustive()
    }
}

/// Derive key material from a raw context string.
///
/// Pure: the same `(context, certificate_subject)` always produces the same
/// keypair and certificate.
pub fn derive_key_material(context: &str, certificate_subject: &str) -> KeyMaterial {
    let seed = seed_from(context.as_bytes());
    let keypair = Keypair::from_seed(&seed);
    let public_key = keypair.public_key_bytes();
    let certificate = sha256_concat(&[certificate_subject.as_bytes(), &public_key]);

    KeyMaterial {
        public_key_hex: hex::encode(public_key),
        certificate_hex: hex::encode(certificate),
        keypair,
    }
}

/// Derive key material from a typed context.
pub fn derive(context: &DerivationContext, certificate_subject: &str) -> KeyMaterial {
    derive_key_material(&context.to_context_string(), certificate_subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    #[test]
    fn derivation_is_pure() {
        let ctx = DerivationContext::payer("user-42", "1234");
        let a = derive(&ctx, "user-42");
        let b = derive(&ctx, "user-42");
        assert_eq!(a.keypair().secret_key_bytes(), b.keypair().secret_key_bytes());
        assert_eq!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.certificate_hex(), b.certificate_hex());
    }

    #[test]
    fn different_pins_give_different_keys() {
        let a = derive(&DerivationContext::payer("user-42", "1234"), "user-42");
        let b = derive(&DerivationContext::payer("user-42", "1235"), "user-42");
        assert_ne!(a.public_key_hex(), b.public_key_hex());
    }

    #[test]
    fn role_separates_keys() {
        let payer = derive(&DerivationContext::payer("x", "a1b2c3"), "x");
        let vendor = derive(&DerivationContext::vendor("x", "a1b2c3"), "x");
        assert_ne!(payer.public_key_hex(), vendor.public_key_hex());
    }

    #[test]
    fn context_string_layout() {
        let ctx = DerivationContext::vendor("vendor-cafe", "f0e1d2");
        assert_eq!(ctx.to_context_string(), "vendor|vendor-cafe|f0e1d2|proxipay");
        assert_eq!(
            DerivationContext::payer("u1", "0000").to_context_string(),
            "payer|u1|0000|proxipay"
        );
    }

    #[test]
    fn certificate_binds_subject_to_key() {
        let km = derive(&DerivationContext::vendor("vendor-cafe", "f0e1d2"), "RX-2294");
        let pk = hex::decode(km.public_key_hex()).unwrap();
        let expected = sha256(&[b"RX-2294".as_slice(), &pk].concat());
        assert_eq!(km.certificate_hex(), hex::encode(expected));

        let other = derive(&DerivationContext::vendor("vendor-cafe", "f0e1d2"), "RX-0000");
        assert_eq!(other.public_key_hex(), km.public_key_hex());
        assert_ne!(other.certificate_hex(), km.certificate_hex());
    }

    #[test]
    fn derived_keys_sign() {
        let km = derive(&DerivationContext::payer("user-42", "1234"), "user-42");
        let sig = km.keypair().sign(b"hello");
        assert!(km.keypair().verify(b"hello", &sig));
    }

    #[test]
    fn debug_redacts_secrets() {
        let ctx = DerivationContext::payer("user-42", "987654");
        assert!(!format!("{:?}", ctx).contains("987654"));
        let km = derive(&ctx, "user-42");
        assert!(!format!("{:?}", km).contains(&hex::encode(km.keypair().secret_key_bytes())));
    }
}

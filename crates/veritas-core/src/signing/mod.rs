//! Signing suite: `sign(private_key, message) -> signature`,
//! `verify(public_key, message, signature) -> bool`, behind one interface
//! with two interchangeable primitives selected by [`crate::model::Suite`].

mod ed25519;
mod mldsa44;

use crate::errors::VeritasResult;
use crate::model::Suite;

/// Key/signature byte lengths for a suite (I8).
pub struct SuiteSizes {
    pub public_key: usize,
    pub signature: usize,
}

impl Suite {
    pub fn sizes(self) -> SuiteSizes {
        match self {
            Suite::Ed25519 => SuiteSizes {
                public_key: 32,
                signature: 64,
            },
            Suite::Mldsa44 => SuiteSizes {
                public_key: 1312,
                signature: 2420,
            },
        }
    }
}

/// An opaque, freshly generated keypair for a suite.
#[derive(Debug, Clone)]
pub struct GeneratedKeypair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// Generate a fresh keypair under `suite`. Tooling-only: the core treats keys
/// as opaque byte strings everywhere else.
pub fn generate_keypair(suite: Suite) -> GeneratedKeypair {
    match suite {
        Suite::Ed25519 => ed25519::generate_keypair(),
        Suite::Mldsa44 => mldsa44::generate_keypair(),
    }
}

/// Sign `message` with `private_key` under `suite`.
pub fn sign(suite: Suite, private_key: &[u8], message: &[u8]) -> VeritasResult<Vec<u8>> {
    match suite {
        Suite::Ed25519 => ed25519::sign(private_key, message),
        Suite::Mldsa44 => mldsa44::sign(private_key, message),
    }
}

/// Verify `signature` over `message` under `public_key` and `suite`.
pub fn verify(suite: Suite, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match suite {
        Suite::Ed25519 => ed25519::verify(public_key, message, signature),
        Suite::Mldsa44 => mldsa44::verify(public_key, message, signature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_round_trip() {
        let kp = generate_keypair(Suite::Ed25519);
        let sig = sign(Suite::Ed25519, &kp.private_key, b"hello").unwrap();
        assert!(verify(Suite::Ed25519, &kp.public_key, b"hello", &sig));
        assert!(!verify(Suite::Ed25519, &kp.public_key, b"other", &sig));
    }

    #[test]
    fn mldsa44_round_trip() {
        let kp = generate_keypair(Suite::Mldsa44);
        assert_eq!(kp.public_key.len(), Suite::Mldsa44.sizes().public_key);
        let sig = sign(Suite::Mldsa44, &kp.private_key, b"hello").unwrap();
        assert_eq!(sig.len(), Suite::Mldsa44.sizes().signature);
        assert!(verify(Suite::Mldsa44, &kp.public_key, b"hello", &sig));
    }

    #[test]
    fn mldsa44_signing_is_deterministic() {
        let kp = generate_keypair(Suite::Mldsa44);
        let a = sign(Suite::Mldsa44, &kp.private_key, b"repeatable").unwrap();
        let b = sign(Suite::Mldsa44, &kp.private_key, b"repeatable").unwrap();
        assert_eq!(a, b);
    }
}

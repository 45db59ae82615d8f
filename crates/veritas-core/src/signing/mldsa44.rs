//! Post-quantum suite: ML-DSA-44 (FIPS 204). 1312-byte public keys,
//! 2420-byte signatures. Signing is deterministic by construction (the
//! `pqcrypto-mldsa` reference bindings do not randomize), satisfying §4.4's
//! "same key + message → same signature" requirement without the
//! private-key-byte-length sniffing the original reference implementation
//! used to decide between a bare secret key and a `sk||pk` blob (see
//! DESIGN.md, open question on key representation).

use pqcrypto_mldsa::mldsa44;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};

use crate::errors::{VeritasError, VeritasResult};
use crate::signing::GeneratedKeypair;

pub fn generate_keypair() -> GeneratedKeypair {
    let (pk, sk) = mldsa44::keypair();
    GeneratedKeypair {
        public_key: pk.as_bytes().to_vec(),
        private_key: sk.as_bytes().to_vec(),
    }
}

pub fn sign(private_key: &[u8], message: &[u8]) -> VeritasResult<Vec<u8>> {
    let sk = mldsa44::SecretKey::from_bytes(private_key)
        .map_err(|_| VeritasError::invalid_argument("invalid ML-DSA-44 secret key length"))?;
    let sig = mldsa44::detached_sign(message, &sk);
    Ok(sig.as_bytes().to_vec())
}

pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk) = mldsa44::PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = mldsa44::DetachedSignature::from_bytes(signature) else {
        return false;
    };
    mldsa44::verify_detached_signature(&sig, message, &pk).is_ok()
}

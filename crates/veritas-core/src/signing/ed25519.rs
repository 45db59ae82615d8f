//! Legacy suite: Ed25519. 32-byte public keys, 64-byte signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::errors::{VeritasError, VeritasResult};
use crate::signing::GeneratedKeypair;

pub fn generate_keypair() -> GeneratedKeypair {
    use ed25519_dalek::SecretKey;
    let mut seed = [0u8; 32];
    getrandom_fill(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key: VerifyingKey = signing_key.verifying_key();
    let _: SecretKey = seed;
    GeneratedKeypair {
        public_key: verifying_key.to_bytes().to_vec(),
        private_key: signing_key.to_bytes().to_vec(),
    }
}

fn getrandom_fill(buf: &mut [u8]) {
    use rand_core::RngCore;
    rand_core::OsRng.fill_bytes(buf);
}

pub fn sign(private_key: &[u8], message: &[u8]) -> VeritasResult<Vec<u8>> {
    let bytes: [u8; 32] = private_key
        .try_into()
        .map_err(|_| VeritasError::invalid_argument("Ed25519 private key must be 32 bytes"))?;
    let signing_key = SigningKey::from_bytes(&bytes);
    let sig: Signature = signing_key.sign(message);
    Ok(sig.to_bytes().to_vec())
}

pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk_bytes): Result<[u8; 32], _> = public_key.try_into() else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = signature.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}

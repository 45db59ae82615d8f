//! Deterministic identity functions.
//!
//! Every id in the system is `prefix || base32(sha256(canonical(fields))[:15])`,
//! lowercased with `=` padding stripped. The construction is frozen: any
//! conforming implementation, given the same canonicalized fields, must
//! reproduce the same id byte-for-byte.

use base32::Alphabet;
use serde_json::Value;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::canonical::canonical_json_bytes;
use crate::errors::VeritasResult;

const BASE32_ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: true };

/// Trim surrounding whitespace and apply Unicode NFC, per §4.2's
/// normalization rule for any field that originates from text.
pub fn normalize_identity_field(s: &str) -> String {
    s.trim().nfc().collect::<String>()
}

fn b32_id(prefix: &str, fields: &[Value]) -> VeritasResult<String> {
    let canonical = canonical_json_bytes(&Value::Array(fields.to_vec()))?;
    let digest = Sha256::digest(&canonical);
    let truncated = &digest[..15];
    let encoded = base32::encode(BASE32_ALPHABET, truncated)
        .to_lowercase()
        .trim_end_matches('=')
        .to_string();
    Ok(format!("{prefix}{encoded}"))
}

/// `entity_id = "ent_" || base32(sha256(canonical([namespace, label]))[:15])`.
pub fn entity_id(namespace: &str, label: &str) -> VeritasResult<String> {
    let namespace = normalize_identity_field(namespace);
    let label = normalize_identity_field(label);
    b32_id(
        "ent_",
        &[Value::String(namespace), Value::String(label)],
    )
}

/// `claim_id = "clm_" || base32(sha256(canonical([subject, predicate, object, object_type]))[:15])`.
pub fn claim_id(subject: &str, predicate: &str, object: &str, object_type: &str) -> VeritasResult<String> {
    b32_id(
        "clm_",
        &[
            Value::String(subject.to_string()),
            Value::String(normalize_identity_field(predicate)),
            Value::String(object.to_string()),
            Value::String(object_type.to_string()),
        ],
    )
}

/// `provenance_id = "p_" || base32(sha256(canonical([source_hash, byte_start, byte_end]))[:15])`.
pub fn provenance_id(source_hash: &str, byte_start: i64, byte_end: i64) -> VeritasResult<String> {
    b32_id(
        "p_",
        &[
            Value::String(source_hash.to_string()),
            Value::Number(byte_start.into()),
            Value::Number(byte_end.into()),
        ],
    )
}

/// `span_id = "s_" || base32(sha256(canonical([source_hash, byte_start, byte_end, text]))[:15])`.
pub fn span_id(source_hash: &str, byte_start: i64, byte_end: i64, text: &str) -> VeritasResult<String> {
    b32_id(
        "s_",
        &[
            Value::String(source_hash.to_string()),
            Value::Number(byte_start.into()),
            Value::Number(byte_end.into()),
            Value::String(text.to_string()),
        ],
    )
}

/// `evidence_addr = "ea_" || base32(sha256(canonical([source_hash, byte_start, byte_end]))[:15])`.
///
/// Intentionally the same shape as `provenance_id` (both are pure functions
/// of the content byte range); kept as a distinct function because the two
/// ids serve different join roles (`provenance_id` is a row's own primary
/// key, `evidence_addr` is the stable join key into `ext/locators`).
pub fn evidence_addr(source_hash: &str, byte_start: i64, byte_end: i64) -> VeritasResult<String> {
    b32_id(
        "ea_",
        &[
            Value::String(source_hash.to_string()),
            Value::Number(byte_start.into()),
            Value::Number(byte_end.into()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_is_deterministic() {
        let a = entity_id("fm21-11", "tourniquet").unwrap();
        let b = entity_id("fm21-11", "tourniquet").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("ent_"));
    }

    #[test]
    fn entity_id_distinguishes_namespace() {
        let a = entity_id("ns-a", "tourniquet").unwrap();
        let b = entity_id("ns-b", "tourniquet").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn claim_id_prefixed_and_stable() {
        let a = claim_id("ent_x", "treats", "ent_y", "entity").unwrap();
        assert!(a.starts_with("clm_"));
        let b = claim_id("ent_x", "treats", "ent_y", "entity").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_padding_characters() {
        let a = entity_id("ns", "label").unwrap();
        assert!(!a.contains('='));
    }

    #[test]
    fn provenance_and_evidence_addr_share_shape_but_differ_in_prefix() {
        let p = provenance_id("deadbeef", 0, 10).unwrap();
        let e = evidence_addr("deadbeef", 0, 10).unwrap();
        assert!(p.starts_with("p_"));
        assert!(e.starts_with("ea_"));
        assert_eq!(&p[2..], &e[3..]);
    }

    #[test]
    fn label_casing_is_preserved() {
        let a = entity_id("ns", "Tourniquet").unwrap();
        let b = entity_id("ns", "tourniquet").unwrap();
        assert_ne!(a, b);
    }
}

//! Knowledge shard data model.
//!
//! This module defines the strongly-typed Rust representations for shard
//! artifacts: the four core relations (entities, claims, provenance, spans),
//! the optional `locators` extension, and the manifest. It is intentionally
//! versioned: wire formats live under a `vN` module so future format
//! changes do not disturb `v1` consumers.
//!
//! Recommended imports: `use veritas_core::model::v1::*;` or
//! `use veritas_core::prelude::*;`.
//!
//! Canonical hashing must never rely on default `serde_json` formatting
//! (ordering/whitespace are not guaranteed); use `crate::canonical` instead.

pub mod v1;

pub use v1::{
    Candidate, ClaimRow, EntityRow, Integrity, License, LocatorInput, LocatorKind, LocatorRow,
    Manifest, ManifestMetadata, ObjectType, ProvenanceRow, Publisher, SourceRef, SpanRow,
    Statistics, Suite,
};

use crate::errors::{VeritasError, VeritasResult};

impl Suite {
    pub const ED25519: &'static str = "ed25519";
    pub const MLDSA44: &'static str = "axm-blake3-mldsa44";

    pub fn as_str(self) -> &'static str {
        match self {
            Suite::Ed25519 => Self::ED25519,
            Suite::Mldsa44 => Self::MLDSA44,
        }
    }

    /// Parse a suite tag, defaulting absent values to `ed25519` per §6/§9 —
    /// the distilled spec treats the lenient default as legacy-only (see
    /// DESIGN.md open question).
    pub fn parse(s: Option<&str>) -> VeritasResult<Suite> {
        match s {
            None => Ok(Suite::Ed25519),
            Some(Self::ED25519) => Ok(Suite::Ed25519),
            Some(Self::MLDSA44) => Ok(Suite::Mldsa44),
            Some(other) => Err(VeritasError::invalid_argument(format!(
                "unknown suite: {other}"
            ))),
        }
    }
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Entity => "entity",
            ObjectType::LiteralString => "literal:string",
            ObjectType::LiteralInteger => "literal:integer",
            ObjectType::LiteralDecimal => "literal:decimal",
            ObjectType::LiteralBoolean => "literal:boolean",
        }
    }

    pub fn parse(s: &str) -> VeritasResult<ObjectType> {
        match s {
            "entity" => Ok(ObjectType::Entity),
            "literal:string" => Ok(ObjectType::LiteralString),
            "literal:integer" => Ok(ObjectType::LiteralInteger),
            "literal:decimal" => Ok(ObjectType::LiteralDecimal),
            "literal:boolean" => Ok(ObjectType::LiteralBoolean),
            other => Err(VeritasError::invalid_argument(format!(
                "unknown object_type: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_defaults_to_ed25519_when_absent() {
        assert_eq!(Suite::parse(None).unwrap(), Suite::Ed25519);
    }

    #[test]
    fn suite_rejects_unknown_tag() {
        assert!(Suite::parse(Some("rsa")).is_err());
    }

    #[test]
    fn object_type_round_trips() {
        for ot in [
            ObjectType::Entity,
            ObjectType::LiteralString,
            ObjectType::LiteralInteger,
            ObjectType::LiteralDecimal,
            ObjectType::LiteralBoolean,
        ] {
            assert_eq!(ObjectType::parse(ot.as_str()).unwrap(), ot);
        }
    }
}

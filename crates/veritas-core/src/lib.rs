//! veritas-core
//!
//! Core primitives for the knowledge shard engine:
//! - canonical JSON encoding for deterministic hashing and signing
//! - deterministic identity functions (entity/claim/provenance/span/evidence ids)
//! - dual-suite Merkle tree construction (legacy `ed25519`, post-quantum
//!   `axm-blake3-mldsa44`)
//! - dual signing suites (Ed25519, ML-DSA-44)
//! - source text normalization (the byte coordinate system provenance spans
//!   reference)
//! - the v1 shard data model
//! - Parquet table I/O for the core relations and extensions

pub mod canonical;
pub mod errors;
pub mod identity;
pub mod merkle;
pub mod model;
pub mod normalize;
pub mod signing;
pub mod tables;

pub use crate::errors::{VeritasError, VeritasErrorCode, VeritasResult};

/// The spec version this crate implements.
pub const SPEC_VERSION: &str = "1.0.0";

/// Convenience re-exports for downstream crates.
pub mod prelude {
    pub use crate::canonical::{canonical_json_bytes, canonical_json_value, to_canonical_bytes};
    pub use crate::errors::{VeritasError, VeritasErrorCode, VeritasResult};
    pub use crate::identity::{claim_id, entity_id, evidence_addr, provenance_id, span_id};
    pub use crate::merkle::{compute_merkle_root, MerkleLimits};
    pub use crate::model::v1::{
        Candidate, ClaimRow, EntityRow, Integrity, License, LocatorInput, LocatorKind, LocatorRow,
        Manifest, ManifestMetadata, ObjectType, ProvenanceRow, Publisher, SourceRef, SpanRow,
        Statistics, Suite,
    };
    pub use crate::normalize::normalize_source_text;
    pub use crate::signing;
}

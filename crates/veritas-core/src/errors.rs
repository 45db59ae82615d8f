//! Error taxonomy for the knowledge shard engine.
//!
//! Every public operation in this workspace returns `Result<T, VeritasError>`.
//! `VeritasError` wraps a stable `VeritasErrorCode` so callers can match on
//! machine-readable identifiers instead of parsing messages. The verifier
//! accumulates many of these into a `VerifyReport` rather than surfacing the
//! first one; the compiler aborts on the first fatal error (per-row evidence
//! misses are the one exception, logged and dropped instead of raised).

use std::fmt;

pub type VeritasResult<T> = Result<T, VeritasError>;

/// Stable error codes shared across implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum VeritasErrorCode {
    LayoutUnexpectedFile,
    LayoutMissing,
    LayoutSymlink,
    LayoutDotfile,
    ManifestSyntax,
    ManifestSchema,
    SigMissing,
    SigInvalid,
    TrustedKeyMismatch,
    MerkleMismatch,
    SchemaViolation,
    IdEntity,
    IdClaim,
    RefOrphan,
    RefSource,
    ProvenanceOutOfBounds,
    EvidenceAmbiguous,
    CanonInvalid,
    Timeout,
    LimitExceeded,
    NoClaims,
    SigningFailed,
    SelfVerifyFailed,
    InvalidArgument,
    Invariant,
    Serialization,
    Io,
    RegistryUnknownRef,
    RegistryNameExists,
    RegistryAliasCollision,
    RegistryInvalidShardId,
    RegistrySchema,
}

impl VeritasErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LayoutUnexpectedFile => "E_LAYOUT_UNEXPECTED",
            Self::LayoutMissing => "E_LAYOUT_MISSING",
            Self::LayoutSymlink => "E_LAYOUT_SYMLINK",
            Self::LayoutDotfile => "E_LAYOUT_DOTFILE",
            Self::ManifestSyntax => "E_MANIFEST_SYNTAX",
            Self::ManifestSchema => "E_MANIFEST_SCHEMA",
            Self::SigMissing => "E_SIG_MISSING",
            Self::SigInvalid => "E_SIG_INVALID",
            Self::TrustedKeyMismatch => "E_TRUSTED_KEY_MISMATCH",
            Self::MerkleMismatch => "E_MERKLE_MISMATCH",
            Self::SchemaViolation => "E_SCHEMA_VIOLATION",
            Self::IdEntity => "E_ID_ENTITY",
            Self::IdClaim => "E_ID_CLAIM",
            Self::RefOrphan => "E_REF_ORPHAN",
            Self::RefSource => "E_REF_SOURCE",
            Self::ProvenanceOutOfBounds => "PROVENANCE_OUT_OF_BOUNDS",
            Self::EvidenceAmbiguous => "E_EVIDENCE_AMBIGUOUS",
            Self::CanonInvalid => "E_CANON_INVALID",
            Self::Timeout => "E_TIMEOUT",
            Self::LimitExceeded => "E_LIMIT_EXCEEDED",
            Self::NoClaims => "E_NO_CLAIMS",
            Self::SigningFailed => "E_SIGNING_FAILED",
            Self::SelfVerifyFailed => "E_SELF_VERIFY_FAILED",
            Self::InvalidArgument => "E_INVALID_ARGUMENT",
            Self::Invariant => "E_INVARIANT",
            Self::Serialization => "E_SERIALIZATION",
            Self::Io => "E_IO",
            Self::RegistryUnknownRef => "E_REGISTRY_UNKNOWN_REF",
            Self::RegistryNameExists => "E_REGISTRY_NAME_EXISTS",
            Self::RegistryAliasCollision => "E_REGISTRY_ALIAS_COLLISION",
            Self::RegistryInvalidShardId => "E_REGISTRY_INVALID_SHARD_ID",
            Self::RegistrySchema => "E_REGISTRY_SCHEMA",
        }
    }
}

impl fmt::Display for VeritasErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct VeritasError {
    pub code: VeritasErrorCode,
    pub message: String,
}

impl VeritasError {
    pub fn new(code: VeritasErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> VeritasErrorCode {
        self.code
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::InvalidArgument, message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::Invariant, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::Serialization, message)
    }

    pub fn evidence_ambiguous(evidence: &str, count: usize) -> Self {
        Self::new(
            VeritasErrorCode::EvidenceAmbiguous,
            format!("evidence occurs {count} times, expected exactly 1: {evidence:.80}"),
        )
    }

    pub fn canon_invalid(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::CanonInvalid, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::Io, message)
    }

    pub fn registry_unknown_ref(ref_: &str) -> Self {
        Self::new(
            VeritasErrorCode::RegistryUnknownRef,
            format!("unknown artifact ref: {ref_:?}"),
        )
    }

    pub fn registry_name_exists(name: &str) -> Self {
        Self::new(
            VeritasErrorCode::RegistryNameExists,
            format!("artifact already exists: {name:?}; use set_current() to update"),
        )
    }

    pub fn registry_alias_collision(alias: &str, owner: &str) -> Self {
        Self::new(
            VeritasErrorCode::RegistryAliasCollision,
            format!("alias {alias:?} is already in use by artifact {owner:?}"),
        )
    }

    pub fn registry_invalid_shard_id(shard_id: &str) -> Self {
        Self::new(
            VeritasErrorCode::RegistryInvalidShardId,
            format!("invalid shard_id format: {shard_id:?}"),
        )
    }

    pub fn registry_schema(message: impl Into<String>) -> Self {
        Self::new(VeritasErrorCode::RegistrySchema, message)
    }
}

impl From<std::io::Error> for VeritasError {
    fn from(e: std::io::Error) -> Self {
        Self::new(VeritasErrorCode::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_code_and_message() {
        let e = VeritasError::invalid_argument("bad thing");
        assert!(e.to_string().contains("E_INVALID_ARGUMENT"));
        assert!(e.to_string().contains("bad thing"));
    }

    #[test]
    fn evidence_ambiguous_carries_code() {
        let e = VeritasError::evidence_ambiguous("drug works", 2);
        assert_eq!(e.code(), VeritasErrorCode::EvidenceAmbiguous);
    }
}

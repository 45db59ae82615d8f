//! v1 shard wire types.

use serde::{Deserialize, Serialize};

/// A named pair of (Merkle-tree variant, signature scheme).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// Legacy: BLAKE3 duplicate-odd-leaf Merkle tree, Ed25519 signatures.
    Ed25519,
    /// Post-quantum: domain-separated RFC 6962 Merkle tree, ML-DSA-44 (FIPS 204) signatures.
    Mldsa44,
}

impl Serialize for Suite {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Suite {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Suite::parse(Some(&s)).map_err(serde::de::Error::custom)
    }
}

/// `claims.object_type`. A closed enum: `entity` or one of four literal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Entity,
    LiteralString,
    LiteralInteger,
    LiteralDecimal,
    LiteralBoolean,
}

impl Serialize for ObjectType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObjectType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ObjectType::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// `graph/entities.parquet` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_id: String,
    pub namespace: String,
    pub label: String,
    pub entity_type: String,
}

/// `graph/claims.parquet` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub claim_id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub object_type: ObjectType,
    pub tier: u8,
}

/// `graph/provenance.parquet` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRow {
    pub provenance_id: String,
    pub claim_id: String,
    pub source_hash: String,
    pub byte_start: i64,
    pub byte_end: i64,
}

/// `evidence/spans.parquet` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRow {
    pub span_id: String,
    pub source_hash: String,
    pub byte_start: i64,
    pub byte_end: i64,
    pub text: String,
}

/// A candidate's structural position in its originating document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    Pdf,
    Docx,
    Html,
    Txt,
    Pptx,
    Xlsx,
}

impl LocatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LocatorKind::Pdf => "pdf",
            LocatorKind::Docx => "docx",
            LocatorKind::Html => "html",
            LocatorKind::Txt => "txt",
            LocatorKind::Pptx => "pptx",
            LocatorKind::Xlsx => "xlsx",
        }
    }

    pub fn parse(s: &str) -> Option<LocatorKind> {
        Some(match s {
            "pdf" => LocatorKind::Pdf,
            "docx" => LocatorKind::Docx,
            "html" => LocatorKind::Html,
            "txt" => LocatorKind::Txt,
            "pptx" => LocatorKind::Pptx,
            "xlsx" => LocatorKind::Xlsx,
            _ => return None,
        })
    }
}

/// `locator` field on a candidate (input shape, §6 candidates format).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocatorInput {
    pub kind: String,
    #[serde(default)]
    pub page_index: Option<i32>,
    #[serde(default)]
    pub paragraph_index: Option<i32>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// `ext/locators.parquet` row — joined by `evidence_addr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorRow {
    pub evidence_addr: String,
    pub span_id: String,
    pub source_hash: String,
    pub kind: String,
    pub page_index: Option<i16>,
    pub paragraph_index: Option<i32>,
    pub block_id: String,
    pub file_path: String,
}

/// A line from the candidates input stream (§6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Candidate {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub object_type: String,
    pub evidence: String,
    #[serde(default)]
    pub tier: i64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub locator: Option<LocatorInput>,
}

/// `sources[]` entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub path: String,
    pub hash: String,
}

/// `manifest.metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub title: String,
    pub namespace: String,
    pub created_at: String,
}

/// `manifest.publisher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub id: String,
    pub name: String,
}

/// `manifest.integrity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub algorithm: String,
    pub merkle_root: String,
}

/// `manifest.statistics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub entities: u64,
    pub claims: u64,
}

/// `manifest.license` (optional).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub spdx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The signed root of a shard (§3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub spec_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<Suite>,
    pub shard_id: String,
    pub metadata: ManifestMetadata,
    pub publisher: Publisher,
    pub sources: Vec<SourceRef>,
    pub integrity: Integrity,
    pub statistics: Statistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl Manifest {
    pub fn suite_or_default(&self) -> crate::errors::VeritasResult<Suite> {
        Suite::parse(self.suite.map(|s| s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_serializes_to_frozen_tags() {
        assert_eq!(serde_json::to_value(Suite::Ed25519).unwrap(), "ed25519");
        assert_eq!(
            serde_json::to_value(Suite::Mldsa44).unwrap(),
            "axm-blake3-mldsa44"
        );
    }

    #[test]
    fn object_type_serializes_to_frozen_tags() {
        assert_eq!(
            serde_json::to_value(ObjectType::LiteralInteger).unwrap(),
            "literal:integer"
        );
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let m = Manifest {
            spec_version: "1.0.0".to_string(),
            suite: Some(Suite::Ed25519),
            shard_id: "shard_blake3_abc".to_string(),
            metadata: ManifestMetadata {
                title: "t".to_string(),
                namespace: "ns".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
            publisher: Publisher {
                id: "pub-1".to_string(),
                name: "Publisher".to_string(),
            },
            sources: vec![SourceRef {
                path: "content/source.txt".to_string(),
                hash: "deadbeef".to_string(),
            }],
            integrity: Integrity {
                algorithm: "blake3".to_string(),
                merkle_root: "root".to_string(),
            },
            statistics: Statistics {
                entities: 1,
                claims: 1,
            },
            extensions: None,
            license: None,
        };
        let v = serde_json::to_value(&m).unwrap();
        let back: Manifest = serde_json::from_value(v).unwrap();
        assert_eq!(m, back);
    }
}

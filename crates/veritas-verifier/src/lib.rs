//! Pure, read-only shard verification (§4.8).
//!
//! `verify_shard` runs nine ordered checks and accumulates every finding
//! instead of stopping at the first one, so a caller sees the whole picture
//! in one report. It never mutates the shard directory and never touches
//! private key material.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use veritas_core::errors::VeritasErrorCode;
use veritas_core::identity::{claim_id, entity_id};
use veritas_core::merkle::{compute_merkle_root, MerkleLimits};
use veritas_core::model::v1::{Manifest, ObjectType};
use veritas_core::{signing, tables};

/// One finding from a check phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyFinding {
    pub code: String,
    pub message: String,
    pub location: String,
}

impl VerifyFinding {
    fn new(code: VeritasErrorCode, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            location: location.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifyStatus {
    Pass,
    Fail,
}

/// The result of verifying one shard directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub status: VerifyStatus,
    pub errors: Vec<VerifyFinding>,
}

impl VerifyReport {
    fn fail(errors: Vec<VerifyFinding>) -> Self {
        Self {
            status: VerifyStatus::Fail,
            errors,
        }
    }

    fn pass() -> Self {
        Self {
            status: VerifyStatus::Pass,
            errors: Vec::new(),
        }
    }
}

const REQUIRED_TOP_LEVEL: &[&str] = &["manifest.json", "sig", "content", "graph", "evidence"];
const OPTIONAL_TOP_LEVEL: &[&str] = &["ext"];
const REQUIRED_GRAPH_FILES: &[&str] = &["entities.parquet", "claims.parquet", "provenance.parquet"];

/// Verify `shard_dir` against `trusted_public_key`, honoring `deadline` (wall
/// clock; `None` disables the timeout). Every check phase that can produce
/// more than one finding accumulates all of them before moving to the next
/// phase; a phase whose failure would make later phases meaningless (layout,
/// manifest syntax) short-circuits the remaining checks.
pub fn verify_shard(
    shard_dir: &Path,
    trusted_public_key: &[u8],
    deadline: Option<Duration>,
) -> VerifyReport {
    let start = Instant::now();
    let check_deadline = |errors: &mut Vec<VerifyFinding>| -> bool {
        if let Some(d) = deadline {
            if start.elapsed() > d {
                errors.push(VerifyFinding::new(
                    VeritasErrorCode::Timeout,
                    "verification deadline exceeded",
                    shard_dir.display().to_string(),
                ));
                return true;
            }
        }
        false
    };

    let mut errors = Vec::new();

    // 1. Layout (I1)
    if let Err(mut layout_errors) = check_layout(shard_dir) {
        errors.append(&mut layout_errors);
        return VerifyReport::fail(errors);
    }
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 2. Manifest syntax
    let manifest_path = shard_dir.join("manifest.json");
    let manifest_bytes = match std::fs::read(&manifest_path) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::ManifestSyntax,
                format!("reading manifest.json: {e}"),
                "manifest.json".to_string(),
            ));
            return VerifyReport::fail(errors);
        }
    };
    let manifest: Manifest = match serde_json::from_slice(&manifest_bytes) {
        Ok(m) => m,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::ManifestSyntax,
                format!("manifest.json does not match the documented schema: {e}"),
                "manifest.json".to_string(),
            ));
            return VerifyReport::fail(errors);
        }
    };
    let suite = match manifest.suite_or_default() {
        Ok(s) => s,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::ManifestSchema,
                e.message,
                "manifest.json#suite".to_string(),
            ));
            return VerifyReport::fail(errors);
        }
    };
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 3 & 4. Signature and key sizes (I8, I7)
    check_signature(shard_dir, &manifest_bytes, suite, trusted_public_key, &mut errors);
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 5. Schema (I2)
    let loaded = match load_tables(shard_dir, &mut errors) {
        Some(l) => l,
        None => return VerifyReport::fail(errors),
    };
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 6. Identity (I3)
    check_identity(&loaded, &mut errors);

    // 7. Referential integrity (I4)
    check_referential_integrity(&loaded, &mut errors);
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 8. Span bounds (I5)
    check_span_bounds(shard_dir, &manifest, &loaded, &mut errors);
    if check_deadline(&mut errors) {
        return VerifyReport::fail(errors);
    }

    // 9. Merkle (I6)
    check_merkle(shard_dir, suite, &manifest, &mut errors);

    if errors.is_empty() {
        VerifyReport::pass()
    } else {
        VerifyReport::fail(errors)
    }
}

fn check_layout(shard_dir: &Path) -> Result<(), Vec<VerifyFinding>> {
    let mut errors = Vec::new();

    if !shard_dir.is_dir() {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::LayoutMissing,
            "shard root is not a directory",
            shard_dir.display().to_string(),
        ));
        return Err(errors);
    }

    let entries = match std::fs::read_dir(shard_dir) {
        Ok(e) => e,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutMissing,
                format!("reading shard root: {e}"),
                shard_dir.display().to_string(),
            ));
            return Err(errors);
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                errors.push(VerifyFinding::new(
                    VeritasErrorCode::LayoutMissing,
                    format!("reading directory entry: {e}"),
                    shard_dir.display().to_string(),
                ));
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                errors.push(VerifyFinding::new(
                    VeritasErrorCode::LayoutMissing,
                    format!("stat failed: {e}"),
                    name.clone(),
                ));
                continue;
            }
        };
        if file_type.is_symlink() {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutSymlink,
                "symlinks are not permitted in a shard",
                name.clone(),
            ));
            continue;
        }
        if name.starts_with('.') {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutDotfile,
                "dotfiles are not permitted in a shard",
                name.clone(),
            ));
            continue;
        }
        if !REQUIRED_TOP_LEVEL.contains(&name.as_str()) && !OPTIONAL_TOP_LEVEL.contains(&name.as_str()) {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutUnexpectedFile,
                "unexpected top-level entry",
                name.clone(),
            ));
            continue;
        }
        seen.insert(name);
    }

    for required in REQUIRED_TOP_LEVEL {
        if !seen.contains(*required) {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutMissing,
                "required top-level entry is missing",
                required.to_string(),
            ));
        }
    }
    for required in REQUIRED_GRAPH_FILES {
        if !shard_dir.join("graph").join(required).is_file() {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::LayoutMissing,
                "required graph table is missing",
                format!("graph/{required}"),
            ));
        }
    }
    if !shard_dir.join("evidence/spans.parquet").is_file() {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::LayoutMissing,
            "required evidence table is missing",
            "evidence/spans.parquet".to_string(),
        ));
    }
    if !shard_dir.join("sig/manifest.sig").is_file() {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::SigMissing,
            "signature file is missing",
            "sig/manifest.sig".to_string(),
        ));
    }
    if !shard_dir.join("sig/publisher.pub").is_file() {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::SigMissing,
            "publisher key file is missing",
            "sig/publisher.pub".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_signature(
    shard_dir: &Path,
    manifest_bytes: &[u8],
    suite: veritas_core::model::v1::Suite,
    trusted_public_key: &[u8],
    errors: &mut Vec<VerifyFinding>,
) {
    let sizes = suite.sizes();

    let signature = match std::fs::read(shard_dir.join("sig/manifest.sig")) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SigMissing,
                format!("reading sig/manifest.sig: {e}"),
                "sig/manifest.sig".to_string(),
            ));
            return;
        }
    };
    let publisher_key = match std::fs::read(shard_dir.join("sig/publisher.pub")) {
        Ok(b) => b,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SigMissing,
                format!("reading sig/publisher.pub: {e}"),
                "sig/publisher.pub".to_string(),
            ));
            return;
        }
    };

    if publisher_key.len() != sizes.public_key {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::TrustedKeyMismatch,
            format!(
                "publisher key is {} bytes, suite {} requires {}",
                publisher_key.len(),
                suite.as_str(),
                sizes.public_key
            ),
            "sig/publisher.pub".to_string(),
        ));
    }
    if signature.len() != sizes.signature {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::SigInvalid,
            format!(
                "signature is {} bytes, suite {} requires {}",
                signature.len(),
                suite.as_str(),
                sizes.signature
            ),
            "sig/manifest.sig".to_string(),
        ));
    }
    if !errors.is_empty() {
        return;
    }

    if !signing::verify(suite, &publisher_key, manifest_bytes, &signature) {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::SigInvalid,
            "manifest signature does not verify under sig/publisher.pub",
            "sig/manifest.sig".to_string(),
        ));
        return;
    }

    if publisher_key != trusted_public_key {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::TrustedKeyMismatch,
            "sig/publisher.pub does not match the trusted anchor key",
            "sig/publisher.pub".to_string(),
        ));
    }
}

struct LoadedTables {
    entities: Vec<veritas_core::model::v1::EntityRow>,
    claims: Vec<veritas_core::model::v1::ClaimRow>,
    provenance: Vec<veritas_core::model::v1::ProvenanceRow>,
    spans: Vec<veritas_core::model::v1::SpanRow>,
}

fn load_tables(shard_dir: &Path, errors: &mut Vec<VerifyFinding>) -> Option<LoadedTables> {
    let entities = match tables::read_entities(&shard_dir.join("graph/entities.parquet")) {
        Ok(rows) => rows,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SchemaViolation,
                e.message,
                "graph/entities.parquet".to_string(),
            ));
            return None;
        }
    };
    let claims = match tables::read_claims(&shard_dir.join("graph/claims.parquet")) {
        Ok(rows) => rows,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SchemaViolation,
                e.message,
                "graph/claims.parquet".to_string(),
            ));
            return None;
        }
    };
    let provenance = match tables::read_provenance(&shard_dir.join("graph/provenance.parquet")) {
        Ok(rows) => rows,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SchemaViolation,
                e.message,
                "graph/provenance.parquet".to_string(),
            ));
            return None;
        }
    };
    let spans = match tables::read_spans(&shard_dir.join("evidence/spans.parquet")) {
        Ok(rows) => rows,
        Err(e) => {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SchemaViolation,
                e.message,
                "evidence/spans.parquet".to_string(),
            ));
            return None;
        }
    };

    for row in &claims {
        if row.tier > 4 {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::SchemaViolation,
                format!("tier {} is outside the allowed range 0..=4", row.tier),
                format!("graph/claims.parquet#{}", row.claim_id),
            ));
        }
    }
    if errors.is_empty() {
        Some(LoadedTables {
            entities,
            claims,
            provenance,
            spans,
        })
    } else {
        None
    }
}

fn check_identity(loaded: &LoadedTables, errors: &mut Vec<VerifyFinding>) {
    for row in &loaded.entities {
        match entity_id(&row.namespace, &row.label) {
            Ok(expected) if expected == row.entity_id => {}
            Ok(expected) => errors.push(VerifyFinding::new(
                VeritasErrorCode::IdEntity,
                format!("recomputed entity_id {expected} does not match stored {}", row.entity_id),
                format!("graph/entities.parquet#{}", row.entity_id),
            )),
            Err(e) => errors.push(VerifyFinding::new(
                VeritasErrorCode::IdEntity,
                e.message,
                format!("graph/entities.parquet#{}", row.entity_id),
            )),
        }
    }

    for row in &loaded.claims {
        match claim_id(&row.subject, &row.predicate, &row.object, row.object_type.as_str()) {
            Ok(expected) if expected == row.claim_id => {}
            Ok(expected) => errors.push(VerifyFinding::new(
                VeritasErrorCode::IdClaim,
                format!("recomputed claim_id {expected} does not match stored {}", row.claim_id),
                format!("graph/claims.parquet#{}", row.claim_id),
            )),
            Err(e) => errors.push(VerifyFinding::new(
                VeritasErrorCode::IdClaim,
                e.message,
                format!("graph/claims.parquet#{}", row.claim_id),
            )),
        }
    }
}

fn check_referential_integrity(loaded: &LoadedTables, errors: &mut Vec<VerifyFinding>) {
    let entity_ids: HashSet<&str> = loaded.entities.iter().map(|r| r.entity_id.as_str()).collect();
    let claim_ids: HashSet<&str> = loaded.claims.iter().map(|r| r.claim_id.as_str()).collect();

    for row in &loaded.claims {
        if !entity_ids.contains(row.subject.as_str()) {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::RefOrphan,
                format!("claims.subject {} has no matching entities row", row.subject),
                format!("graph/claims.parquet#{}", row.claim_id),
            ));
        }
        if row.object_type == ObjectType::Entity && !entity_ids.contains(row.object.as_str()) {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::RefOrphan,
                format!("claims.object {} has no matching entities row", row.object),
                format!("graph/claims.parquet#{}", row.claim_id),
            ));
        }
    }

    for row in &loaded.provenance {
        if !claim_ids.contains(row.claim_id.as_str()) {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::RefOrphan,
                format!("provenance.claim_id {} has no matching claims row", row.claim_id),
                format!("graph/provenance.parquet#{}", row.provenance_id),
            ));
        }
        let has_span = loaded.spans.iter().any(|s| {
            s.source_hash == row.source_hash && s.byte_start == row.byte_start && s.byte_end == row.byte_end
        });
        if !has_span {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::RefOrphan,
                "provenance row has no matching spans row with the same (source_hash, byte_start, byte_end)",
                format!("graph/provenance.parquet#{}", row.provenance_id),
            ));
        }
    }
}

fn check_span_bounds(
    shard_dir: &Path,
    manifest: &Manifest,
    loaded: &LoadedTables,
    errors: &mut Vec<VerifyFinding>,
) {
    let mut content_len_by_hash: HashMap<String, u64> = HashMap::new();
    for source in &manifest.sources {
        let path: PathBuf = shard_dir.join(&source.path);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                errors.push(VerifyFinding::new(
                    VeritasErrorCode::RefSource,
                    format!("reading declared source {}: {e}", source.path),
                    source.path.clone(),
                ));
                continue;
            }
        };
        let actual_hash = hex::encode(Sha256::digest(&bytes));
        if actual_hash != source.hash {
            errors.push(VerifyFinding::new(
                VeritasErrorCode::RefSource,
                format!("content hash mismatch: manifest declares {}, file hashes to {actual_hash}", source.hash),
                source.path.clone(),
            ));
            continue;
        }
        content_len_by_hash.insert(source.hash.clone(), bytes.len() as u64);
    }

    for row in &loaded.provenance {
        check_one_span(
            &content_len_by_hash,
            &row.source_hash,
            row.byte_start,
            row.byte_end,
            &format!("graph/provenance.parquet#{}", row.provenance_id),
            errors,
        );
    }
    for row in &loaded.spans {
        check_one_span(
            &content_len_by_hash,
            &row.source_hash,
            row.byte_start,
            row.byte_end,
            &format!("evidence/spans.parquet#{}", row.span_id),
            errors,
        );
    }
}

fn check_one_span(
    content_len_by_hash: &HashMap<String, u64>,
    source_hash: &str,
    byte_start: i64,
    byte_end: i64,
    location: &str,
    errors: &mut Vec<VerifyFinding>,
) {
    let Some(len) = content_len_by_hash.get(source_hash) else {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::RefSource,
            format!("source_hash {source_hash} is not declared in manifest.sources"),
            location.to_string(),
        ));
        return;
    };
    if byte_start < 0 || byte_end <= byte_start || byte_end as u64 > *len {
        errors.push(VerifyFinding::new(
            VeritasErrorCode::ProvenanceOutOfBounds,
            format!("byte range [{byte_start}, {byte_end}) is invalid for a {len}-byte source"),
            location.to_string(),
        ));
    }
}

fn check_merkle(
    shard_dir: &Path,
    suite: veritas_core::model::v1::Suite,
    manifest: &Manifest,
    errors: &mut Vec<VerifyFinding>,
) {
    match compute_merkle_root(shard_dir, suite, MerkleLimits::default()) {
        Ok(root) if root == manifest.integrity.merkle_root => {}
        Ok(root) => errors.push(VerifyFinding::new(
            VeritasErrorCode::MerkleMismatch,
            format!("recomputed Merkle root {root} does not match manifest {}", manifest.integrity.merkle_root),
            "manifest.json#integrity.merkle_root".to_string(),
        )),
        Err(e) => errors.push(VerifyFinding::new(
            VeritasErrorCode::MerkleMismatch,
            e.message,
            "manifest.json#integrity.merkle_root".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_fails_on_missing_directory() {
        let report = verify_shard(Path::new("/nonexistent/shard"), b"", None);
        assert_eq!(report.status, VerifyStatus::Fail);
        assert!(!report.errors.is_empty());
    }

    #[test]
    fn verify_fails_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = verify_shard(dir.path(), b"", None);
        assert_eq!(report.status, VerifyStatus::Fail);
        assert!(report.errors.iter().any(|e| e.code == "E_LAYOUT_MISSING"));
    }
}

//! Compiles a normalized source document and a candidate claims stream into
//! a signed, self-verified knowledge shard (§4.7).

pub mod candidates;

use std::collections::BTreeMap;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use veritas_core::errors::{VeritasError, VeritasResult};
use veritas_core::identity::{claim_id, entity_id, evidence_addr, provenance_id, span_id};
use veritas_core::merkle::{compute_merkle_root, MerkleLimits};
use veritas_core::model::v1::{
    ClaimRow, EntityRow, Integrity, License, LocatorRow, Manifest, ManifestMetadata, ObjectType,
    ProvenanceRow, Publisher, SourceRef, SpanRow, Statistics, Suite,
};
use veritas_core::normalize::normalize_source_text;
use veritas_core::signing::GeneratedKeypair;
use veritas_core::{signing, tables};

pub use candidates::{load_candidates, Candidate};

/// Everything the compiler needs that does not come from the candidate
/// stream or the source text itself.
///
/// `keypair` carries both halves of the publisher's signing key. Unlike the
/// reference implementation this replaces, there is no private-key-length
/// sniffing to recover a public key the caller forgot to supply: the caller
/// must hold a real `(private_key, public_key)` pair for the declared suite
/// (typically from `signing::generate_keypair` or a previously persisted
/// keypair), and compilation fails fast if the sizes don't match the suite.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub out_dir: PathBuf,
    pub keypair: GeneratedKeypair,
    pub publisher_id: String,
    pub publisher_name: String,
    pub namespace: String,
    pub created_at: String,
    pub suite: Suite,
    pub title: String,
    pub license: Option<License>,
}

/// What a successful compile produced.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub manifest: Manifest,
    pub public_key: Vec<u8>,
}

/// Compile `source_text` and `candidates` into a signed shard under
/// `cfg.out_dir`, then self-verify it before returning.
pub fn compile_shard(
    source_text: &str,
    candidates: &[Candidate],
    cfg: &CompilerConfig,
) -> VeritasResult<CompileOutcome> {
    // 1. Normalize source, write content/source.txt, compute source_hash.
    let normalized = normalize_source_text(source_text);
    let content_bytes = normalized.as_bytes();
    let source_hash = hex::encode(Sha256::digest(content_bytes));

    // 2. Prepare clean output directories.
    if cfg.out_dir.exists() {
        std::fs::remove_dir_all(&cfg.out_dir)?;
    }
    for sub in ["content", "graph", "evidence", "sig", "ext"] {
        std::fs::create_dir_all(cfg.out_dir.join(sub))?;
    }
    let source_rel_path = "content/source.txt";
    std::fs::write(cfg.out_dir.join(source_rel_path), content_bytes)?;

    // 3. First pass: collect entity labels.
    let mut entities: BTreeMap<String, String> = BTreeMap::new();
    for c in candidates {
        let subject = c.subject.trim();
        if subject.is_empty() {
            continue;
        }
        entities
            .entry(subject.to_string())
            .or_insert_with(|| entity_id(&cfg.namespace, subject).unwrap_or_default());

        if c.object_type == "entity" {
            let object = c.object.trim();
            if !object.is_empty() {
                entities
                    .entry(object.to_string())
                    .or_insert_with(|| entity_id(&cfg.namespace, object).unwrap_or_default());
            }
        }
    }
    let mut entity_rows: Vec<EntityRow> = Vec::with_capacity(entities.len());
    for (label, id) in &entities {
        entity_rows.push(EntityRow {
            entity_id: id.clone(),
            namespace: cfg.namespace.clone(),
            label: label.clone(),
            entity_type: "concept".to_string(),
        });
    }

    // 4. Second pass: claims, evidence spans, provenance, locators.
    let mut claim_rows = Vec::new();
    let mut provenance_rows = Vec::new();
    let mut span_rows = Vec::new();
    let mut locator_rows = Vec::new();

    for c in candidates {
        let subject = c.subject.trim();
        let predicate = c.predicate.trim();
        let object = c.object.trim();
        if subject.is_empty() || predicate.is_empty() || c.evidence.is_empty() {
            continue;
        }
        let object_type = match ObjectType::parse(&c.object_type) {
            Ok(ot) => ot,
            Err(_) => continue,
        };
        let tier = if (0..=4).contains(&c.tier) { c.tier as u8 } else { 0 };

        let subject_id = entities
            .get(subject)
            .cloned()
            .unwrap_or(entity_id(&cfg.namespace, subject)?);
        let object_value = if object_type == ObjectType::Entity {
            entities
                .get(object)
                .cloned()
                .unwrap_or(entity_id(&cfg.namespace, object)?)
        } else {
            object.to_string()
        };

        let (byte_start, byte_end) = match find_span_strict(content_bytes, &c.evidence) {
            Ok(range) => range,
            Err(EvidenceLookup::NotFound) => {
                warn!(evidence = %truncate(&c.evidence, 80), "evidence not found, dropping candidate");
                continue;
            }
            Err(EvidenceLookup::Ambiguous(count)) => {
                return Err(VeritasError::evidence_ambiguous(&c.evidence, count));
            }
        };

        let cid = claim_id(&subject_id, predicate, &object_value, object_type.as_str())?;
        let pid = provenance_id(&source_hash, byte_start, byte_end)?;
        let sid = span_id(&source_hash, byte_start, byte_end, &c.evidence)?;
        let eaddr = evidence_addr(&source_hash, byte_start, byte_end)?;

        claim_rows.push(ClaimRow {
            claim_id: cid.clone(),
            subject: subject_id,
            predicate: predicate.to_string(),
            object: object_value,
            object_type,
            tier,
        });
        provenance_rows.push(ProvenanceRow {
            provenance_id: pid,
            claim_id: cid,
            source_hash: source_hash.clone(),
            byte_start,
            byte_end,
        });
        span_rows.push(SpanRow {
            span_id: sid.clone(),
            source_hash: source_hash.clone(),
            byte_start,
            byte_end,
            text: c.evidence.clone(),
        });

        if let Some(locator) = &c.locator {
            locator_rows.push(LocatorRow {
                evidence_addr: eaddr,
                span_id: sid,
                source_hash: source_hash.clone(),
                kind: locator.kind.clone(),
                page_index: locator.page_index.map(|v| v as i16),
                paragraph_index: locator.paragraph_index,
                block_id: locator.block_id.clone().unwrap_or_default(),
                file_path: locator.file_path.clone().unwrap_or_default(),
            });
        }
    }

    if claim_rows.is_empty() {
        return Err(VeritasError::new(
            veritas_core::errors::VeritasErrorCode::NoClaims,
            "no candidate produced a claim with resolvable evidence",
        ));
    }

    // 5. Write tables.
    let mut entity_rows = entity_rows;
    tables::write_entities(&cfg.out_dir.join("graph/entities.parquet"), &mut entity_rows)?;
    let mut claim_rows = claim_rows;
    tables::write_claims(&cfg.out_dir.join("graph/claims.parquet"), &mut claim_rows)?;
    let mut provenance_rows = provenance_rows;
    tables::write_provenance(
        &cfg.out_dir.join("graph/provenance.parquet"),
        &mut provenance_rows,
    )?;
    let mut span_rows = span_rows;
    tables::write_spans(&cfg.out_dir.join("evidence/spans.parquet"), &mut span_rows)?;

    let mut extensions = Vec::new();
    if !locator_rows.is_empty() {
        tables::write_locators(&cfg.out_dir.join("ext/locators.parquet"), &mut locator_rows)?;
        extensions.push("locators@1".to_string());
    } else {
        std::fs::remove_dir(cfg.out_dir.join("ext")).ok();
    }

    // 6. Merkle root.
    let merkle_root = compute_merkle_root(&cfg.out_dir, cfg.suite, MerkleLimits::default())?;

    // 7. Build manifest.
    let manifest = Manifest {
        spec_version: veritas_core::SPEC_VERSION.to_string(),
        suite: Some(cfg.suite),
        shard_id: format!("shard_blake3_{merkle_root}"),
        metadata: ManifestMetadata {
            title: cfg.title.clone(),
            namespace: cfg.namespace.clone(),
            created_at: cfg.created_at.clone(),
        },
        publisher: Publisher {
            id: cfg.publisher_id.clone(),
            name: cfg.publisher_name.clone(),
        },
        sources: vec![SourceRef {
            path: source_rel_path.to_string(),
            hash: source_hash,
        }],
        integrity: Integrity {
            algorithm: "blake3".to_string(),
            merkle_root,
        },
        statistics: Statistics {
            entities: entity_rows.len() as u64,
            claims: claim_rows.len() as u64,
        },
        extensions: if extensions.is_empty() { None } else { Some(extensions) },
        license: cfg.license.clone(),
    };
    let manifest_bytes = veritas_core::canonical::to_canonical_bytes(&manifest)?;
    std::fs::write(cfg.out_dir.join("manifest.json"), &manifest_bytes)?;

    // 8. Sign.
    let sizes = cfg.suite.sizes();
    if cfg.keypair.public_key.len() != sizes.public_key {
        return Err(VeritasError::new(
            veritas_core::errors::VeritasErrorCode::SigningFailed,
            format!(
                "public key is {} bytes, suite {} requires {}",
                cfg.keypair.public_key.len(),
                cfg.suite.as_str(),
                sizes.public_key
            ),
        ));
    }
    let signature = signing::sign(cfg.suite, &cfg.keypair.private_key, &manifest_bytes).map_err(|e| {
        VeritasError::new(
            veritas_core::errors::VeritasErrorCode::SigningFailed,
            e.message,
        )
    })?;
    let public_key = cfg.keypair.public_key.clone();
    std::fs::write(cfg.out_dir.join("sig/manifest.sig"), &signature)?;
    std::fs::write(cfg.out_dir.join("sig/publisher.pub"), &public_key)?;

    // 9. Self-verify using the just-written key as the trusted anchor.
    let report = veritas_verifier::verify_shard(&cfg.out_dir, &public_key, None);
    if report.status != veritas_verifier::VerifyStatus::Pass {
        return Err(VeritasError::new(
            veritas_core::errors::VeritasErrorCode::SelfVerifyFailed,
            format!(
                "self-verification failed with {} finding(s): {}",
                report.errors.len(),
                report
                    .errors
                    .first()
                    .map(|e| e.message.as_str())
                    .unwrap_or("")
            ),
        ));
    }

    info!(shard_id = %manifest.shard_id, claims = claim_rows.len(), "shard compiled and self-verified");
    Ok(CompileOutcome { manifest, public_key })
}

enum EvidenceLookup {
    NotFound,
    Ambiguous(usize),
}

fn find_span_strict(content: &[u8], needle: &str) -> Result<(i64, i64), EvidenceLookup> {
    let needle_bytes = needle.as_bytes();
    if needle_bytes.is_empty() {
        return Err(EvidenceLookup::NotFound);
    }
    let mut positions = Vec::new();
    let mut start = 0;
    while let Some(pos) = find_subslice(&content[start..], needle_bytes) {
        positions.push(start + pos);
        start += pos + 1;
        if positions.len() > 1 {
            break;
        }
    }
    match positions.len() {
        0 => Err(EvidenceLookup::NotFound),
        1 => {
            let idx = positions[0];
            Ok((idx as i64, (idx + needle_bytes.len()) as i64))
        }
        _ => {
            let count = content
                .windows(needle_bytes.len())
                .filter(|w| *w == needle_bytes)
                .count();
            Err(EvidenceLookup::Ambiguous(count))
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        s.to_string()
    } else {
        let mut end = max_bytes;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cfg(out_dir: PathBuf, keypair: GeneratedKeypair) -> CompilerConfig {
        CompilerConfig {
            out_dir,
            keypair,
            publisher_id: "pub-1".to_string(),
            publisher_name: "Field Manual Publisher".to_string(),
            namespace: "fm21-11".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            suite: Suite::Ed25519,
            title: "Tourniquet Shard".to_string(),
            license: None,
        }
    }

    #[test]
    fn compiles_single_claim_shard_and_self_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shard");
        let keypair = signing::generate_keypair(Suite::Ed25519);
        let cfg = base_cfg(out.clone(), keypair);

        let candidates = vec![Candidate {
            subject: "Tourniquet".to_string(),
            predicate: "treats".to_string(),
            object: "severe bleeding".to_string(),
            object_type: "literal:string".to_string(),
            evidence: "Tourniquet treats severe bleeding.".to_string(),
            tier: 3,
            confidence: None,
            locator: None,
        }];

        let outcome = compile_shard("Tourniquet treats severe bleeding.", &candidates, &cfg).unwrap();
        assert_eq!(outcome.manifest.statistics.claims, 1);
        assert!(out.join("manifest.json").is_file());
        assert!(out.join("sig/manifest.sig").is_file());
    }

    #[test]
    fn ambiguous_evidence_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shard");
        let keypair = signing::generate_keypair(Suite::Ed25519);
        let cfg = base_cfg(out, keypair);

        let candidates = vec![Candidate {
            subject: "Tourniquet".to_string(),
            predicate: "treats".to_string(),
            object: "bleeding".to_string(),
            object_type: "literal:string".to_string(),
            evidence: "bleeding".to_string(),
            tier: 3,
            confidence: None,
            locator: None,
        }];

        let result = compile_shard("bleeding risk and bleeding control.", &candidates, &cfg);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().code(),
            veritas_core::errors::VeritasErrorCode::EvidenceAmbiguous
        );
    }

    #[test]
    fn no_resolvable_claims_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shard");
        let keypair = signing::generate_keypair(Suite::Ed25519);
        let cfg = base_cfg(out, keypair);

        let candidates = vec![Candidate {
            subject: "Tourniquet".to_string(),
            predicate: "treats".to_string(),
            object: "bleeding".to_string(),
            object_type: "literal:string".to_string(),
            evidence: "not present in source".to_string(),
            tier: 3,
            confidence: None,
            locator: None,
        }];

        let result = compile_shard("Tourniquet treats severe bleeding.", &candidates, &cfg);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().code(),
            veritas_core::errors::VeritasErrorCode::NoClaims
        );
    }
}

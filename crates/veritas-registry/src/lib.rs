//! The registry (§4.9): a persistent JSON document mapping human artifact
//! refs — canonical names and aliases — to shard ids, with append-only
//! history and an optional trust-key policy per artifact. Writes are atomic
//! (write-temp + rename on the same filesystem) and re-validate the whole
//! document against a schema before they land; a corrupt registry never
//! loads silently, it fails the next read.
//!
//! Every mutating operation also appends one line to an audit log (§4.11 of
//! the expanded spec) after the registry document itself is durably written.
//! The audit append is best-effort: a failure there does not roll back or
//! fail the registry mutation, it is only surfaced as a warning.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use veritas_core::errors::{VeritasError, VeritasResult};

fn shard_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^shard_blake3_[a-f0-9]+$").expect("static regex"))
}

fn now_iso8601() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

/// One append-only history entry recording a pointer move.
///
/// `compiler` and `spec_version` are additive over the distilled registry
/// contract (see `RegistryHistoryEntry` in the expanded spec) so a reader can
/// tell which compiler build produced a given pointer move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryHistoryEntry {
    pub shard_id: String,
    pub timestamp: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
}

/// A trust-key policy attached to an artifact, if the registrant opted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub trust_key: String,
    pub require_verified: bool,
}

/// One artifact entry: a canonical name, its aliases, and its pointer
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub current: String,
    pub history: Vec<RegistryHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<TrustPolicy>,
}

/// The registry document: `{artifacts: {name: entry}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub artifacts: BTreeMap<String, RegistryEntry>,
}

/// `resolve_with_meta`'s return shape: canonical name, resolved shard_id, and
/// the ref the caller actually passed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRef {
    pub name: String,
    pub shard_id: String,
    pub resolved_from: String,
}

/// A frozen `{ref: shard_id}` snapshot, suitable for reproducible runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub pinned_at: String,
    pub pins: BTreeMap<String, String>,
}

/// A handle over one registry document on disk. Owned and threaded
/// explicitly through call sites — there is no ambient singleton.
pub struct Registry {
    path: PathBuf,
    audit_log_path: PathBuf,
    data: RegistryDocument,
}

impl Registry {
    /// Open (or initialize) the registry document at `path`. A missing file
    /// is treated as an empty registry; an existing file that fails to parse
    /// or fails schema validation is a hard error.
    pub fn open(path: impl Into<PathBuf>) -> VeritasResult<Self> {
        let path = path.into();
        let audit_log_path = path
            .parent()
            .map(|dir| dir.join("audit.log"))
            .unwrap_or_else(|| PathBuf::from("audit.log"));

        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            let data: RegistryDocument = serde_json::from_slice(&bytes)
                .map_err(|e| VeritasError::registry_schema(format!("registry document is not valid JSON: {e}")))?;
            validate(&data)?;
            data
        } else {
            RegistryDocument::default()
        };

        Ok(Self { path, audit_log_path, data })
    }

    /// Resolve a human ref to a shard_id. Accepts a canonical name, an
    /// alias, or a bare `shard_id` (passed through unchanged).
    pub fn resolve(&self, ref_: &str) -> VeritasResult<String> {
        if shard_id_re().is_match(ref_) {
            return Ok(ref_.to_string());
        }
        let (_, entry) = self.find_with_name(ref_);
        entry
            .map(|e| e.current.clone())
            .ok_or_else(|| VeritasError::registry_unknown_ref(ref_))
    }

    /// Resolve a ref and return canonical name + shard_id, for callers that
    /// need audit clarity or UI display.
    pub fn resolve_with_meta(&self, ref_: &str) -> VeritasResult<ResolvedRef> {
        if shard_id_re().is_match(ref_) {
            return Ok(ResolvedRef {
                name: ref_.to_string(),
                shard_id: ref_.to_string(),
                resolved_from: ref_.to_string(),
            });
        }
        let (name, entry) = self.find_with_name(ref_);
        let entry = entry.ok_or_else(|| VeritasError::registry_unknown_ref(ref_))?;
        Ok(ResolvedRef {
            name: name.expect("entry implies a matched name"),
            shard_id: entry.current.clone(),
            resolved_from: ref_.to_string(),
        })
    }

    /// Register a brand-new artifact. Fails if the name already exists.
    #[allow(clippy::too_many_arguments)]
    pub fn add_artifact(
        &mut self,
        name: &str,
        shard_id: &str,
        reason: &str,
        aliases: Vec<String>,
        tags: Vec<String>,
        trust_key: Option<String>,
        compiler: Option<String>,
        spec_version: Option<String>,
    ) -> VeritasResult<()> {
        if !shard_id_re().is_match(shard_id) {
            return Err(VeritasError::registry_invalid_shard_id(shard_id));
        }
        if self.data.artifacts.contains_key(name) {
            return Err(VeritasError::registry_name_exists(name));
        }

        let history = vec![RegistryHistoryEntry {
            shard_id: shard_id.to_string(),
            timestamp: now_iso8601(),
            reason: reason.to_string(),
            compiler: compiler.clone(),
            spec_version: spec_version.clone(),
        }];
        let policy = trust_key.map(|trust_key| TrustPolicy {
            trust_key,
            require_verified: true,
        });
        let entry = RegistryEntry {
            name: name.to_string(),
            aliases,
            tags,
            current: shard_id.to_string(),
            history,
            policy,
        };
        self.data.artifacts.insert(name.to_string(), entry);
        self.save()?;
        self.append_audit("add_artifact", name, shard_id, reason);
        Ok(())
    }

    /// Point an artifact at a new shard, appending a history entry. Never
    /// removes old entries.
    pub fn set_current(
        &mut self,
        name: &str,
        shard_id: &str,
        reason: &str,
        compiler: Option<String>,
        spec_version: Option<String>,
    ) -> VeritasResult<()> {
        if !shard_id_re().is_match(shard_id) {
            return Err(VeritasError::registry_invalid_shard_id(shard_id));
        }
        let entry = self
            .data
            .artifacts
            .get_mut(name)
            .ok_or_else(|| VeritasError::registry_unknown_ref(name))?;

        entry.current = shard_id.to_string();
        entry.history.push(RegistryHistoryEntry {
            shard_id: shard_id.to_string(),
            timestamp: now_iso8601(),
            reason: reason.to_string(),
            compiler,
            spec_version,
        });
        self.save()?;
        self.append_audit("set_current", name, shard_id, reason);
        Ok(())
    }

    /// Add an alias to an artifact. Fails if the alias is already owned by a
    /// *different* artifact; a no-op if it already points at this one.
    pub fn add_alias(&mut self, name: &str, alias: &str) -> VeritasResult<()> {
        if let (Some(existing_name), Some(_)) = self.find_with_name(alias) {
            if existing_name != name {
                return Err(VeritasError::registry_alias_collision(alias, &existing_name));
            }
            return Ok(());
        }

        let entry = self
            .data
            .artifacts
            .get_mut(name)
            .ok_or_else(|| VeritasError::registry_unknown_ref(name))?;
        entry.aliases.push(alias.to_string());
        let current = entry.current.clone();
        self.save()?;
        self.append_audit("add_alias", name, &current, &format!("alias {alias}"));
        Ok(())
    }

    /// The append-only history for an artifact.
    pub fn list_history(&self, ref_: &str) -> VeritasResult<Vec<RegistryHistoryEntry>> {
        let (_, entry) = self.find_with_name(ref_);
        let entry = entry.ok_or_else(|| VeritasError::registry_unknown_ref(ref_))?;
        Ok(entry.history.clone())
    }

    /// All canonical artifact names, in sorted order.
    pub fn list_artifacts(&self) -> Vec<String> {
        self.data.artifacts.keys().cloned().collect()
    }

    /// All canonical artifact names carrying `tag`, in sorted order.
    pub fn list_artifacts_with_tag(&self, tag: &str) -> Vec<String> {
        self.data
            .artifacts
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| t == tag))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Resolve every ref in `refs` and freeze the result as a lockfile.
    pub fn export_lockfile(&self, refs: &[String]) -> VeritasResult<Lockfile> {
        let mut pins = BTreeMap::new();
        for ref_ in refs {
            pins.insert(ref_.clone(), self.resolve(ref_)?);
        }
        Ok(Lockfile {
            pinned_at: now_iso8601(),
            pins,
        })
    }

    fn find_with_name(&self, ref_: &str) -> (Option<String>, Option<&RegistryEntry>) {
        if let Some(entry) = self.data.artifacts.get(ref_) {
            return (Some(ref_.to_string()), Some(entry));
        }
        for (name, entry) in &self.data.artifacts {
            if entry.aliases.iter().any(|a| a == ref_) {
                return (Some(name.clone()), Some(entry));
            }
        }
        (None, None)
    }

    fn save(&self) -> VeritasResult<()> {
        validate(&self.data)?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_vec_pretty(&self.data)
            .map_err(|e| VeritasError::serialization(format!("encoding registry document: {e}")))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| VeritasError::io(format!("persisting registry document: {e}")))?;
        Ok(())
    }

    fn append_audit(&self, op: &str, name: &str, shard_id: &str, reason: &str) {
        let line = serde_json::json!({
            "ts": now_iso8601(),
            "op": op,
            "name": name,
            "shard_id": shard_id,
            "reason": reason,
        });
        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!(path = %self.audit_log_path.display(), error = %e, "failed to append audit log entry");
        }
    }
}

fn validate(data: &RegistryDocument) -> VeritasResult<()> {
    for (name, entry) in &data.artifacts {
        if entry.name != *name {
            return Err(VeritasError::registry_schema(format!(
                "artifact key {name:?} does not match entry.name {:?}",
                entry.name
            )));
        }
        if !shard_id_re().is_match(&entry.current) {
            return Err(VeritasError::registry_schema(format!(
                "artifact {name:?} has malformed current shard_id {:?}",
                entry.current
            )));
        }
        for hist in &entry.history {
            if !shard_id_re().is_match(&hist.shard_id) {
                return Err(VeritasError::registry_schema(format!(
                    "artifact {name:?} has a malformed shard_id in history: {:?}",
                    hist.shard_id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::errors::VeritasErrorCode;

    const SHARD_A: &str = "shard_blake3_aaaaaaaaaaaaaaaa";
    const SHARD_B: &str = "shard_blake3_bbbbbbbbbbbbbbbb";

    fn open_empty() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::open(dir.path().join("artifacts.json")).unwrap();
        (dir, reg)
    }

    #[test]
    fn add_artifact_then_resolve_by_name() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("fm21-11/hemorrhage", SHARD_A, "initial", vec![], vec![], None, None, None)
            .unwrap();
        assert_eq!(reg.resolve("fm21-11/hemorrhage").unwrap(), SHARD_A);
    }

    #[test]
    fn bare_shard_id_passes_through() {
        let (_dir, reg) = open_empty();
        assert_eq!(reg.resolve(SHARD_A).unwrap(), SHARD_A);
    }

    #[test]
    fn unknown_ref_is_an_error() {
        let (_dir, reg) = open_empty();
        let err = reg.resolve("nope").unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::RegistryUnknownRef);
    }

    #[test]
    fn adding_duplicate_name_fails() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        let err = reg
            .add_artifact("a", SHARD_B, "r2", vec![], vec![], None, None, None)
            .unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::RegistryNameExists);
    }

    #[test]
    fn set_current_appends_history_without_removing_old_entries() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "initial", vec![], vec![], None, None, None)
            .unwrap();
        reg.set_current("a", SHARD_B, "retrain", Some("veritas-compiler/0.1".into()), None)
            .unwrap();
        assert_eq!(reg.resolve("a").unwrap(), SHARD_B);
        let history = reg.list_history("a").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].shard_id, SHARD_A);
        assert_eq!(history[1].shard_id, SHARD_B);
        assert_eq!(history[1].compiler.as_deref(), Some("veritas-compiler/0.1"));
    }

    #[test]
    fn alias_resolves_to_the_same_artifact() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.add_alias("a", "a:latest").unwrap();
        assert_eq!(reg.resolve("a:latest").unwrap(), SHARD_A);
    }

    #[test]
    fn alias_collision_across_artifacts_is_rejected() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.add_artifact("b", SHARD_B, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.add_alias("a", "shared").unwrap();
        let err = reg.add_alias("b", "shared").unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::RegistryAliasCollision);
    }

    #[test]
    fn re_adding_the_same_alias_to_the_same_artifact_is_a_noop() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.add_alias("a", "a:latest").unwrap();
        reg.add_alias("a", "a:latest").unwrap();
        let entry = reg.find_with_name("a").1.unwrap();
        assert_eq!(entry.aliases.iter().filter(|a| *a == "a:latest").count(), 1);
    }

    #[test]
    fn export_lockfile_pins_every_ref() {
        let (_dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.add_alias("a", "a:latest").unwrap();
        let lock = reg
            .export_lockfile(&["a".to_string(), "a:latest".to_string()])
            .unwrap();
        assert_eq!(lock.pins["a"], SHARD_A);
        assert_eq!(lock.pins["a:latest"], SHARD_A);
    }

    #[test]
    fn registry_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.json");
        {
            let mut reg = Registry::open(&path).unwrap();
            reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
                .unwrap();
        }
        let reg = Registry::open(&path).unwrap();
        assert_eq!(reg.resolve("a").unwrap(), SHARD_A);
    }

    #[test]
    fn invalid_shard_id_is_rejected() {
        let (_dir, mut reg) = open_empty();
        let err = reg
            .add_artifact("a", "not-a-shard-id", "r", vec![], vec![], None, None, None)
            .unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::RegistryInvalidShardId);
    }

    #[test]
    fn audit_log_records_one_line_per_mutation() {
        let (dir, mut reg) = open_empty();
        reg.add_artifact("a", SHARD_A, "r", vec![], vec![], None, None, None)
            .unwrap();
        reg.set_current("a", SHARD_B, "r2", None, None).unwrap();
        let audit = fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert_eq!(audit.lines().count(), 2);
    }
}

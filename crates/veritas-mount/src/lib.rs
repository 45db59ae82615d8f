//! The mount runtime (§4.10): loads a verified shard into a read-only
//! relational view over an embedded analytical engine (`datafusion`) and
//! answers read-only SQL against it.
//!
//! `mount` performs §4.8 verification before registering a single view.
//! Failed verification leaves zero externally visible state. The same
//! `(shard_id, merkle_root)` pair always deduplicates to one mount; a
//! process-wide lock (held across the async registration calls, not just
//! the metadata bookkeeping) serializes mount/unmount/catalog mutations per
//! §5, while queries against an already-registered session run concurrently
//! through the embedded engine's own threading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arrow::array::{
    Array, BooleanArray, Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use sha2::{Digest, Sha256};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tokio::sync::Mutex;
use tracing::{debug, info};

use veritas_core::errors::{VeritasError, VeritasResult};
use veritas_verifier::{verify_shard, VerifyStatus};

const CORE_TABLES: [&str; 3] = ["entities", "claims", "provenance"];

/// A catalog entry: the view names a mount registered and how to reach it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MountInfo {
    pub mount_id: String,
    pub shard_id: String,
    pub merkle_root: String,
    pub tables: Vec<String>,
    pub transport: String,
}

struct MountedShard {
    ctx: SessionContext,
    info: MountInfo,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, MountedShard>,
    by_shard_key: HashMap<(String, String), String>,
}

/// The process-wide mount catalog. Callers obtain one instance at startup
/// and thread it explicitly through call sites; there is no ambient
/// singleton (§5).
pub struct MountRuntime {
    inner: Mutex<Inner>,
}

impl Default for MountRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRuntime {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Verify `shard_dir` against `trusted_key` and, on PASS, register
    /// read-only views over its four core tables plus any `ext/*.parquet`
    /// extension tables. Re-mounting the same `(shard_id, merkle_root)`
    /// returns the existing session without touching the engine again.
    pub async fn mount(&self, shard_dir: &Path, trusted_key: &[u8]) -> VeritasResult<MountInfo> {
        let report = verify_shard(shard_dir, trusted_key, None);
        if report.status != VerifyStatus::Pass {
            let first = report
                .errors
                .first()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "verification failed with no detail".to_string());
            return Err(VeritasError::invariant(format!(
                "refusing to mount unverified shard at {}: {first}",
                shard_dir.display()
            )));
        }

        let manifest_bytes = std::fs::read(shard_dir.join("manifest.json"))?;
        let manifest: veritas_core::model::Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| VeritasError::serialization(format!("re-parsing manifest.json: {e}")))?;
        let shard_id = manifest.shard_id.clone();
        let merkle_root = manifest.integrity.merkle_root.clone();
        let key = (shard_id.clone(), merkle_root.clone());

        let mut guard = self.inner.lock().await;
        if let Some(mount_id) = guard.by_shard_key.get(&key) {
            debug!(%shard_id, mount_id, "reusing existing mount for shard");
            return Ok(guard.by_id[mount_id].info.clone());
        }

        let suffix = mount_suffix(&shard_id, &merkle_root);
        let mount_id = format!("mount_{suffix}");
        let ctx = SessionContext::new();
        let mut tables = Vec::new();

        for table in CORE_TABLES {
            let path = shard_dir.join("graph").join(format!("{table}.parquet"));
            let view = format!("{table}_{suffix}");
            register_parquet(&ctx, &view, &path).await?;
            tables.push(view);
        }
        let spans_view = format!("spans_{suffix}");
        register_parquet(&ctx, &spans_view, &shard_dir.join("evidence/spans.parquet")).await?;
        tables.push(spans_view);

        let ext_dir = shard_dir.join("ext");
        if ext_dir.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&ext_dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|e| e == "parquet"))
                .collect();
            entries.sort();
            for path in entries {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("ext")
                    .replace(['@', '.', '-'], "_");
                let view = format!("{stem}_{suffix}");
                register_parquet(&ctx, &view, &path).await?;
                tables.push(view);
            }
        }

        let info = MountInfo {
            mount_id: mount_id.clone(),
            shard_id,
            merkle_root,
            tables,
            transport: "datafusion/in-process".to_string(),
        };
        guard.by_id.insert(
            mount_id.clone(),
            MountedShard {
                ctx,
                info: info.clone(),
            },
        );
        guard.by_shard_key.insert(key, mount_id);
        info!(shard_id = %info.shard_id, mount_id = %info.mount_id, tables = info.tables.len(), "mounted shard");
        Ok(info)
    }

    /// Run a read-only query against an active mount. Rejects anything that
    /// is not a single bare `SELECT` or `WITH ... SELECT` statement before
    /// it ever reaches the engine.
    pub async fn query(&self, mount_id: &str, sql: &str) -> VeritasResult<Vec<serde_json::Value>> {
        ensure_read_only(sql)?;
        let guard = self.inner.lock().await;
        let mounted = guard
            .by_id
            .get(mount_id)
            .ok_or_else(|| VeritasError::invalid_argument(format!("unknown mount: {mount_id}")))?;
        let df = mounted
            .ctx
            .sql(sql)
            .await
            .map_err(|e| VeritasError::invalid_argument(format!("SQL error: {e}")))?;
        let batches = df
            .collect()
            .await
            .map_err(|e| VeritasError::invalid_argument(format!("SQL error: {e}")))?;
        batches_to_rows(&batches)
    }

    /// Drop every view belonging to `mount_id` and forget the session.
    pub async fn unmount(&self, mount_id: &str) -> VeritasResult<()> {
        let mut guard = self.inner.lock().await;
        guard
            .by_id
            .remove(mount_id)
            .ok_or_else(|| VeritasError::invalid_argument(format!("unknown mount: {mount_id}")))?;
        guard.by_shard_key.retain(|_, v| v != mount_id);
        debug!(mount_id, "unmounted shard");
        Ok(())
    }

    /// Every currently active mount.
    pub async fn list_mounts(&self) -> Vec<MountInfo> {
        let guard = self.inner.lock().await;
        guard.by_id.values().map(|m| m.info.clone()).collect()
    }
}

async fn register_parquet(ctx: &SessionContext, view: &str, path: &Path) -> VeritasResult<()> {
    if !path.is_file() {
        return Err(VeritasError::io(format!(
            "missing table file: {}",
            path.display()
        )));
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| VeritasError::invalid_argument("shard path is not valid UTF-8"))?;
    ctx.register_parquet(view, path_str, ParquetReadOptions::default())
        .await
        .map_err(|e| VeritasError::io(format!("registering table {view}: {e}")))?;
    Ok(())
}

fn mount_suffix(shard_id: &str, merkle_root: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(shard_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(merkle_root.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

/// Reject anything but a single `SELECT` or `WITH ... SELECT`.
fn ensure_read_only(sql: &str) -> VeritasResult<()> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| VeritasError::invalid_argument(format!("SQL parse error: {e}")))?;
    if statements.len() != 1 {
        return Err(VeritasError::invalid_argument(
            "exactly one statement is allowed per query",
        ));
    }
    match &statements[0] {
        Statement::Query(_) => Ok(()),
        other => Err(VeritasError::invalid_argument(format!(
            "only read-only SELECT/WITH queries are allowed, got: {other}"
        ))),
    }
}

fn batches_to_rows(batches: &[RecordBatch]) -> VeritasResult<Vec<serde_json::Value>> {
    let mut rows = Vec::new();
    for batch in batches {
        let schema = batch.schema();
        for row_idx in 0..batch.num_rows() {
            let mut row = serde_json::Map::new();
            for (col_idx, field) in schema.fields().iter().enumerate() {
                let column = batch.column(col_idx);
                let value = cell_to_json(column, row_idx)
                    .map_err(|e| VeritasError::invariant(format!("column {}: {e}", field.name())))?;
                row.insert(field.name().clone(), value);
            }
            rows.push(serde_json::Value::Object(row));
        }
    }
    Ok(rows)
}

fn cell_to_json(column: &dyn Array, row: usize) -> Result<serde_json::Value, String> {
    if column.is_null(row) {
        return Ok(serde_json::Value::Null);
    }
    let value = match column.data_type() {
        DataType::Utf8 => serde_json::Value::String(
            column
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or("expected Utf8 array")?
                .value(row)
                .to_string(),
        ),
        DataType::Int64 => column
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or("expected Int64 array")?
            .value(row)
            .into(),
        DataType::Int32 => column
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or("expected Int32 array")?
            .value(row)
            .into(),
        DataType::Int16 => column
            .as_any()
            .downcast_ref::<Int16Array>()
            .ok_or("expected Int16 array")?
            .value(row)
            .into(),
        DataType::Int8 => column
            .as_any()
            .downcast_ref::<Int8Array>()
            .ok_or("expected Int8 array")?
            .value(row)
            .into(),
        DataType::Float64 => column
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or("expected Float64 array")?
            .value(row)
            .into(),
        DataType::Boolean => column
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or("expected Boolean array")?
            .value(row)
            .into(),
        other => return Err(format!("unsupported column type in query result: {other:?}")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::errors::VeritasErrorCode;

    #[tokio::test]
    async fn mount_of_missing_directory_is_rejected() {
        let runtime = MountRuntime::new();
        let dir = tempfile::tempdir().unwrap();
        let err = runtime
            .mount(&dir.path().join("does-not-exist"), b"")
            .await
            .unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::Invariant);
    }

    #[test]
    fn rejects_non_select_statements() {
        assert!(ensure_read_only("SELECT 1").is_ok());
        assert!(ensure_read_only("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
        assert!(ensure_read_only("DELETE FROM entities").is_err());
        assert!(ensure_read_only("DROP TABLE entities").is_err());
        assert!(ensure_read_only("SELECT 1; SELECT 2").is_err());
    }

    #[tokio::test]
    async fn querying_an_unknown_mount_is_an_error() {
        let runtime = MountRuntime::new();
        let err = runtime.query("mount_nope", "SELECT 1").await.unwrap_err();
        assert_eq!(err.code(), VeritasErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn listing_mounts_on_a_fresh_runtime_is_empty() {
        let runtime = MountRuntime::new();
        assert!(runtime.list_mounts().await.is_empty());
    }
}

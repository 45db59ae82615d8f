use anyhow::{Context, Result};
use serde::Serialize;

use veritas_mount::MountRuntime;
use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::{EXIT_MOUNT_UNREACHABLE, EXIT_OK, EXIT_REGISTRY, EXIT_SHARD_MISSING};

#[derive(Debug, Serialize)]
struct MountOut {
    #[serde(flatten)]
    info: veritas_mount::MountInfo,
    rows: Option<Vec<serde_json::Value>>,
}

/// Mount one shard and, optionally, run a single query against it before
/// exiting. `--no-verify` does not skip §4.8 verification — the mount
/// runtime never allows that — it instead trusts the publisher key shipped
/// inside the shard itself (`sig/publisher.pub`) rather than requiring an
/// externally supplied `--trusted-key`, i.e. trust-on-first-use.
pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::Mount {
        ref_,
        registry,
        store,
        trusted_key,
        no_verify,
        query,
    } = &cli.command
    else {
        unreachable!("dispatch only calls mount::run for Command::Mount")
    };

    let paths = crate::config::resolve_paths(registry.as_deref(), store.as_deref(), trusted_key.as_deref(), file_cfg);

    let reg = Registry::open(&paths.registry)?;
    let shard_id = match reg.resolve(ref_) {
        Ok(id) => id,
        Err(e) => {
            output::eprintln_line(&e.to_string());
            return Ok(EXIT_REGISTRY);
        }
    };

    let shard_dir = paths.store.join(&shard_id);
    if !shard_dir.is_dir() {
        output::eprintln_line(&format!("shard {shard_id} not found at {}", shard_dir.display()));
        return Ok(EXIT_SHARD_MISSING);
    }

    let trusted_key_bytes = if *no_verify {
        std::fs::read(shard_dir.join("sig/publisher.pub"))
            .with_context(|| format!("reading embedded publisher key for shard {shard_id}"))?
    } else {
        let path = paths
            .trusted_key
            .as_ref()
            .context("--trusted-key (or VERITAS_TRUSTED_KEY / config) is required unless --no-verify is set")?;
        std::fs::read(path).with_context(|| format!("reading trusted key {}", path.display()))?
    };

    let runtime = MountRuntime::new();
    let info = match runtime.mount(&shard_dir, &trusted_key_bytes).await {
        Ok(info) => info,
        Err(e) => {
            output::eprintln_line(&e.to_string());
            return Ok(EXIT_MOUNT_UNREACHABLE);
        }
    };

    let rows = match query {
        Some(sql) => Some(runtime.query(&info.mount_id, sql).await?),
        None => None,
    };

    output::print(&MountOut { info, rows })?;
    Ok(EXIT_OK)
}

//! Config resolution (§6): CLI flag > environment variable > on-disk config
//! file > compiled-in default, for every path the CLI needs (registry,
//! shard store root, trusted key).

use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_REGISTRY: &str = "registry/artifacts.json";
const DEFAULT_STORE: &str = "shards";

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub registry: Option<String>,
    pub trusted_key: Option<String>,
    pub store: Option<String>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let cfg: FileConfig = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        Ok(cfg)
    }
}

/// Resolve one setting through the four-tier order. `cli` wins outright;
/// otherwise the environment variable, then the config file field, then the
/// compiled-in default.
pub fn resolve(cli: Option<&str>, env_var: &str, file_value: Option<&str>, default: Option<&str>) -> Option<String> {
    if let Some(v) = cli {
        return Some(v.to_string());
    }
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return Some(v);
        }
    }
    if let Some(v) = file_value {
        return Some(v.to_string());
    }
    default.map(str::to_string)
}

pub struct ResolvedPaths {
    pub registry: PathBuf,
    pub store: PathBuf,
    pub trusted_key: Option<PathBuf>,
}

pub fn resolve_paths(
    cli_registry: Option<&str>,
    cli_store: Option<&str>,
    cli_trusted_key: Option<&str>,
    file: &FileConfig,
) -> ResolvedPaths {
    let registry = resolve(
        cli_registry,
        "VERITAS_REGISTRY",
        file.registry.as_deref(),
        Some(DEFAULT_REGISTRY),
    )
    .expect("default always present");
    let store = resolve(
        cli_store,
        "VERITAS_STORE",
        file.store.as_deref(),
        Some(DEFAULT_STORE),
    )
    .expect("default always present");
    let trusted_key = resolve(cli_trusted_key, "VERITAS_TRUSTED_KEY", file.trusted_key.as_deref(), None);

    ResolvedPaths {
        registry: PathBuf::from(registry),
        store: PathBuf::from(store),
        trusted_key: trusted_key.map(PathBuf::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_everything() {
        let resolved = resolve(Some("cli-value"), "VERITAS_TEST_NONEXISTENT_VAR", Some("file-value"), Some("default"));
        assert_eq!(resolved.as_deref(), Some("cli-value"));
    }

    #[test]
    fn default_is_used_when_nothing_else_is_set() {
        let resolved = resolve(None, "VERITAS_TEST_NONEXISTENT_VAR", None, Some("default"));
        assert_eq!(resolved.as_deref(), Some("default"));
    }

    #[test]
    fn file_value_beats_default_but_loses_to_cli() {
        let resolved = resolve(None, "VERITAS_TEST_NONEXISTENT_VAR", Some("file-value"), Some("default"));
        assert_eq!(resolved.as_deref(), Some("file-value"));
    }
}

use anyhow::Result;
use serde::Serialize;

use veritas_core::errors::VeritasErrorCode;
use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::{EXIT_OK, EXIT_REGISTRY};

#[derive(Debug, Serialize)]
struct ResolveOut {
    #[serde(rename = "ref")]
    ref_: String,
    shard_id: String,
}

pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::Resolve { ref_, registry, lock } = &cli.command else {
        unreachable!("dispatch only calls resolve::run for Command::Resolve")
    };

    if let Some(lock_path) = lock {
        let bytes = std::fs::read(lock_path)?;
        let lockfile: veritas_registry::Lockfile = serde_json::from_slice(&bytes)?;
        return match lockfile.pins.get(ref_) {
            Some(shard_id) => {
                output::print(&ResolveOut {
                    ref_: ref_.clone(),
                    shard_id: shard_id.clone(),
                })?;
                Ok(EXIT_OK)
            }
            None => {
                output::eprintln_line(&format!("ref {ref_:?} is not pinned in {lock_path}"));
                Ok(EXIT_REGISTRY)
            }
        };
    }

    let paths = crate::config::resolve_paths(registry.as_deref(), None, None, file_cfg);
    let reg = Registry::open(&paths.registry)?;
    match reg.resolve(ref_) {
        Ok(shard_id) => {
            output::print(&ResolveOut {
                ref_: ref_.clone(),
                shard_id,
            })?;
            Ok(EXIT_OK)
        }
        Err(e) if e.code() == VeritasErrorCode::RegistryUnknownRef => {
            output::eprintln_line(&e.to_string());
            Ok(EXIT_REGISTRY)
        }
        Err(e) => Err(e.into()),
    }
}

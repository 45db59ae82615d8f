use anyhow::Result;
use serde::Serialize;

use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::{EXIT_OK, EXIT_REGISTRY};

#[derive(Debug, Serialize)]
struct AliasOut {
    name: String,
    alias: String,
}

pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::Alias { ref_, alias, registry } = &cli.command else {
        unreachable!("dispatch only calls alias::run for Command::Alias")
    };

    let paths = crate::config::resolve_paths(registry.as_deref(), None, None, file_cfg);
    let mut reg = Registry::open(&paths.registry)?;

    match reg.add_alias(ref_, alias) {
        Ok(()) => {
            output::print(&AliasOut {
                name: ref_.clone(),
                alias: alias.clone(),
            })?;
            Ok(EXIT_OK)
        }
        Err(e) => {
            output::eprintln_line(&e.to_string());
            Ok(EXIT_REGISTRY)
        }
    }
}

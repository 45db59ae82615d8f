use anyhow::Result;

use veritas_core::errors::VeritasErrorCode;
use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::{EXIT_OK, EXIT_REGISTRY};

pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::History { ref_, registry } = &cli.command else {
        unreachable!("dispatch only calls history::run for Command::History")
    };

    let paths = crate::config::resolve_paths(registry.as_deref(), None, None, file_cfg);
    let reg = Registry::open(&paths.registry)?;

    match reg.list_history(ref_) {
        Ok(history) => {
            output::print(&history)?;
            Ok(EXIT_OK)
        }
        Err(e) if e.code() == VeritasErrorCode::RegistryUnknownRef => {
            output::eprintln_line(&e.to_string());
            Ok(EXIT_REGISTRY)
        }
        Err(e) => Err(e.into()),
    }
}

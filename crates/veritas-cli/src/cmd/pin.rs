use anyhow::Result;

use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::{EXIT_OK, EXIT_REGISTRY};

pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::Pin { refs, out, registry } = &cli.command else {
        unreachable!("dispatch only calls pin::run for Command::Pin")
    };

    let paths = crate::config::resolve_paths(registry.as_deref(), None, None, file_cfg);
    let reg = Registry::open(&paths.registry)?;

    let lockfile = match reg.export_lockfile(refs) {
        Ok(lockfile) => lockfile,
        Err(e) => {
            output::eprintln_line(&e.to_string());
            return Ok(EXIT_REGISTRY);
        }
    };

    let bytes = serde_json::to_vec_pretty(&lockfile)?;
    std::fs::write(out, bytes)?;
    output::print(&lockfile)?;
    Ok(EXIT_OK)
}

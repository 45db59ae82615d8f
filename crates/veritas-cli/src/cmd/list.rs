use anyhow::Result;

use veritas_registry::Registry;

use crate::args::{Cli, Command};
use crate::config::FileConfig;
use crate::output;

use super::EXIT_OK;

pub async fn run(cli: &Cli, file_cfg: &FileConfig) -> Result<i32> {
    let Command::List { tag, registry } = &cli.command else {
        unreachable!("dispatch only calls list::run for Command::List")
    };

    let paths = crate::config::resolve_paths(registry.as_deref(), None, None, file_cfg);
    let reg = Registry::open(&paths.registry)?;

    let names = match tag {
        Some(tag) => reg.list_artifacts_with_tag(tag),
        None => reg.list_artifacts(),
    };
    output::print(&names)?;
    Ok(EXIT_OK)
}

use crate::args::{Cli, Command};
use crate::config::FileConfig;

mod alias;
mod compile;
mod history;
mod list;
mod mount;
mod pin;
mod resolve;
mod verify;

/// Standard exit codes (§6): 0 PASS, 2 resolve/registry error, 3
/// verification failure, 4 referenced shard missing on disk, 5 mount
/// runtime unreachable, 6 compile failure, 1 other.
pub const EXIT_OK: i32 = 0;
pub const EXIT_REGISTRY: i32 = 2;
pub const EXIT_VERIFY_FAIL: i32 = 3;
pub const EXIT_SHARD_MISSING: i32 = 4;
pub const EXIT_MOUNT_UNREACHABLE: i32 = 5;
pub const EXIT_COMPILE_FAIL: i32 = 6;
pub const EXIT_OTHER: i32 = 1;

pub async fn dispatch(cli: Cli) -> i32 {
    let file_cfg = match FileConfig::load(cli.config.as_deref().map(std::path::Path::new)) {
        Ok(cfg) => cfg,
        Err(e) => {
            crate::output::eprintln_line(&format!("error: {e}"));
            return EXIT_OTHER;
        }
    };

    let result = match &cli.command {
        Command::Compile { .. } => compile::run(&cli).await,
        Command::Verify { .. } => verify::run(&cli).await,
        Command::Resolve { .. } => resolve::run(&cli, &file_cfg).await,
        Command::Pin { .. } => pin::run(&cli, &file_cfg).await,
        Command::Alias { .. } => alias::run(&cli, &file_cfg).await,
        Command::History { .. } => history::run(&cli, &file_cfg).await,
        Command::List { .. } => list::run(&cli, &file_cfg).await,
        Command::Mount { .. } => mount::run(&cli, &file_cfg).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            crate::output::eprintln_line(&format!("error: {e}"));
            EXIT_OTHER
        }
    }
}

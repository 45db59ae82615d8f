use std::path::Path;

use anyhow::{Context, Result};

use veritas_verifier::{verify_shard, VerifyStatus};

use crate::args::{Cli, Command, VerifyTarget};
use crate::output;

use super::{EXIT_OK, EXIT_VERIFY_FAIL};

pub async fn run(cli: &Cli) -> Result<i32> {
    let Command::Verify { target } = &cli.command else {
        unreachable!("dispatch only calls verify::run for Command::Verify")
    };
    let VerifyTarget::Shard { dir, trusted_key } = target;

    let trusted_key_bytes = std::fs::read(trusted_key).with_context(|| format!("reading trusted key {trusted_key}"))?;
    let report = verify_shard(Path::new(dir), &trusted_key_bytes, None);
    let code = if report.status == VerifyStatus::Pass {
        EXIT_OK
    } else {
        EXIT_VERIFY_FAIL
    };
    output::print(&report)?;
    Ok(code)
}

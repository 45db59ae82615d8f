use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use termcolor::{ColorChoice, StandardStream};

use veritas_core::canonical::to_canonical_bytes;

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(json: bool) {
    JSON_MODE.store(json, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

/// Print `value` through the canonical JSON encoder so CLI output is itself
/// byte-stable, matching every other signed/hashed artifact in this system.
pub fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let bytes = to_canonical_bytes(value)
        .map_err(|e| anyhow::anyhow!("encoding output: {e}"))?;
    io::stdout().write_all(&bytes)?;
    println!();
    Ok(())
}

pub fn eprintln_line(msg: &str) {
    let _ = writeln!(io::stderr(), "{msg}");
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

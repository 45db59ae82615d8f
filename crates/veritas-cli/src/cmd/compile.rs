use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use veritas_compiler::{compile_shard, load_candidates, CompilerConfig};
use veritas_core::model::Suite;
use veritas_core::signing;

use crate::args::{Cli, Command};
use crate::output;

use super::EXIT_COMPILE_FAIL;

#[derive(Debug, Serialize)]
struct CompileOut {
    shard_id: String,
    entities: u64,
    claims: u64,
    out_dir: String,
}

pub async fn run(cli: &Cli) -> Result<i32> {
    let Command::Compile {
        source,
        candidates,
        out,
        namespace,
        publisher_id,
        publisher_name,
        created_at,
        suite,
        key,
    } = &cli.command
    else {
        unreachable!("dispatch only calls compile::run for Command::Compile")
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("static template"));
    pb.enable_steady_tick(std::time::Duration::from_millis(80));

    pb.set_message("reading source");
    let source_text = std::fs::read_to_string(source).with_context(|| format!("reading source file {source}"))?;

    pb.set_message("reading candidates");
    let candidates_file = File::open(candidates).with_context(|| format!("opening candidates file {candidates}"))?;
    let candidates = load_candidates(BufReader::new(candidates_file)).map_err(|e| anyhow!(e.to_string()))?;

    let suite = Suite::parse(Some(suite.as_str())).map_err(|e| anyhow!(e.to_string()))?;

    pb.set_message("preparing signing key");
    let keypair = match key {
        Some(path) => load_keypair(path, suite)?,
        None => signing::generate_keypair(suite),
    };

    let cfg = CompilerConfig {
        out_dir: PathBuf::from(out),
        keypair,
        publisher_id: publisher_id.clone(),
        publisher_name: publisher_name.clone(),
        namespace: namespace.clone(),
        created_at: created_at.clone(),
        suite,
        title: namespace.clone(),
        license: None,
    };

    pb.set_message("compiling and self-verifying");
    let outcome = match compile_shard(&source_text, &candidates, &cfg) {
        Ok(outcome) => outcome,
        Err(e) => {
            pb.finish_and_clear();
            output::eprintln_line(&format!("compile failed: {e}"));
            return Ok(EXIT_COMPILE_FAIL);
        }
    };
    pb.finish_and_clear();

    output::print(&CompileOut {
        shard_id: outcome.manifest.shard_id,
        entities: outcome.manifest.statistics.entities,
        claims: outcome.manifest.statistics.claims,
        out_dir: out.clone(),
    })?;
    Ok(super::EXIT_OK)
}

/// A private key file is raw key bytes for the declared suite. The public
/// half still has to be derivable or co-located, since the compiler needs
/// both halves of a real keypair (see `CompilerConfig::keypair`); this CLI
/// only supports loading a full keypair previously written by `generate` —
/// a bare private key with no matching public key cannot self-verify.
fn load_keypair(path: &str, suite: Suite) -> Result<signing::GeneratedKeypair> {
    let private_key = std::fs::read(path).with_context(|| format!("reading private key {path}"))?;
    let pub_path = format!("{path}.pub");
    let public_key = std::fs::read(&pub_path).with_context(|| format!("reading public key {pub_path}"))?;
    let sizes = suite.sizes();
    if public_key.len() != sizes.public_key {
        return Err(anyhow!(
            "public key at {pub_path} is {} bytes, expected {} for suite {}",
            public_key.len(),
            sizes.public_key,
            suite.as_str()
        ));
    }
    Ok(signing::GeneratedKeypair { public_key, private_key })
}

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Parser, Debug, Clone)]
#[command(name = "veritas", version, about = "Knowledge shard compiler, verifier, registry, and mount CLI")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to an on-disk config file (third tier of the resolution order).
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Structured log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// tracing-subscriber env-filter directive, e.g. "info" or "debug".
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile a source document and a candidates stream into a signed,
    /// self-verified shard.
    Compile {
        /// Path to the source text file.
        source: String,
        #[arg(long)]
        candidates: String,
        #[arg(long)]
        out: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        publisher_id: String,
        #[arg(long)]
        publisher_name: String,
        #[arg(long)]
        created_at: String,
        #[arg(long, default_value = "ed25519")]
        suite: String,
        /// Path to a private key file. If omitted, a fresh keypair is
        /// generated and its public half is written into the shard.
        #[arg(long)]
        key: Option<String>,
    },

    /// Verify a shard directory against a trusted publisher key.
    Verify {
        #[command(subcommand)]
        target: VerifyTarget,
    },

    /// Resolve a human ref (name, alias, or bare shard_id) to a shard_id.
    Resolve {
        #[arg(name = "ref")]
        ref_: String,
        #[arg(long)]
        registry: Option<String>,
        #[arg(long)]
        lock: Option<String>,
    },

    /// Pin a set of refs into a reproducible lockfile.
    Pin {
        #[arg(name = "ref", required = true)]
        refs: Vec<String>,
        #[arg(long)]
        out: String,
        #[arg(long)]
        registry: Option<String>,
    },

    /// Add an alias to an existing artifact.
    Alias {
        #[arg(name = "ref")]
        ref_: String,
        alias: String,
        #[arg(long)]
        registry: Option<String>,
    },

    /// Print the append-only pointer history for an artifact.
    History {
        #[arg(name = "ref")]
        ref_: String,
        #[arg(long)]
        registry: Option<String>,
    },

    /// List every artifact name in the registry.
    List {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        registry: Option<String>,
    },

    /// Verify then mount a shard as queryable SQL views.
    Mount {
        #[arg(name = "ref")]
        ref_: String,
        #[arg(long)]
        registry: Option<String>,
        #[arg(long)]
        store: Option<String>,
        #[arg(long)]
        trusted_key: Option<String>,
        #[arg(long)]
        no_verify: bool,
        /// Run this SQL query against the mount immediately and exit.
        #[arg(long)]
        query: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum VerifyTarget {
    /// Verify a shard directory.
    Shard {
        dir: String,
        #[arg(long)]
        trusted_key: String,
    },
}

//! `tracing-subscriber` setup for the root command's `--log-format` /
//! `--log-level` flags (§6.1, ambient — does not change any spec verb).

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub fn init(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    match format {
        LogFormat::Text => {
            let _ = subscriber.try_init();
        }
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
    }
}

use clap::Parser;

mod args;
mod cmd;
mod config;
mod logging;
mod output;

#[tokio::main]
async fn main() {
    let cli = args::Cli::parse();
    output::init(cli.json);
    logging::init(cli.log_format, &cli.log_level);

    let code = cmd::dispatch(cli).await;
    std::process::exit(code);
}

use anyhow::Context;
use clap::Parser;
use tracing::Level;

mod cli;
mod commands;
mod ingest;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = commands::load_config(&cli)?;
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config
            .log_level
            .parse()
            .with_context(|| format!("invalid log_level {:?}", config.log_level))?
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    commands::run_command(cli, config)
}

mod cli;
mod coerce;
mod commands;
mod grading;
mod history;
mod model;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify(args) => commands::classify::run(args, &cli.global),
        Commands::Upload(args) => commands::upload::run(args, &cli.global),
        Commands::History(args) => commands::history::run(args, &cli.global),
        Commands::ClearHistory => commands::history::clear(&cli.global),
        Commands::Status => commands::status::run(&cli.global),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

//! recsync - CLI tool for exploring record services.
//!
//! A thin wrapper over the `recsync` engine: fetch records with pending
//! local changes merged in, upload and delete with offline queuing, and
//! inspect or flush the queues.

mod cli;
mod commands;
mod output;
mod service;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use commands::{delete, fetch, flush, pending, reset, upload};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.json_logs);

    let global = &cli.global;
    match cli.command {
        Commands::Fetch(args) => fetch::run(global, args).await,
        Commands::Upload(args) => upload::run(global, args).await,
        Commands::Delete(args) => delete::run(global, args).await,
        Commands::Pending(args) => pending::run(global, args).await,
        Commands::Flush(args) => flush::run(global, args).await,
        Commands::Reset(args) => reset::run(global, args).await,
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays parseable.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

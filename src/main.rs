use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod bridge;
mod cli;
mod command;
mod config;
mod diagnostics;
mod module;
mod mount;
mod runtime;
mod startup;

use cli::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => command::run_startup(args).await,
        Commands::Inspect {
            module,
            json,
            trap_unknown_imports,
        } => command::run_inspect(module, json, trap_unknown_imports).await,
    }
}

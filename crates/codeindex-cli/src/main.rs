//! Codeindex CLI
//!
//! Keeps the indexes of your codebase in sync with the source tree.

use anyhow::Result;
use clap::Parser;
use codeindex_core::error::exit_codes;
use codeindex_core::{CodeIndexError, Database};
use std::process::ExitCode;

mod app;
mod commands;
mod progress;

use app::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<CodeIndexError>()
                .map(CodeIndexError::exit_code)
                .unwrap_or(exit_codes::GENERAL_ERROR);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db = Database::open(Database::default_path())?;
    db.initialize()?;

    match cli.command {
        Commands::Refresh(args) => {
            commands::refresh::run(args, &db, cli.config, cli.format).await
        }
        Commands::Status(args) => commands::status::run(args, &db, cli.format).await,
        Commands::Cleanup => commands::cleanup::run(&db).await,
    }
}

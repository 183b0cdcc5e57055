//! Saleflow CLI - Database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sf-cli migrate
//!
//! # Load stores, prices and closed sessions from a YAML file
//! sf-cli seed --file crates/cli/seed/demo.yaml
//! ```
//!
//! Both commands read the database URL from `SALEFLOW_DATABASE_URL`
//! (falling back to `DATABASE_URL`), loading `.env` when present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Saleflow CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed stores, price tables and closed sessions from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(short, long, default_value = "crates/cli/seed/demo.yaml")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
    }
    Ok(())
}

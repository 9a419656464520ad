//! AgriSathi CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! agrisathi-cli migrate
//!
//! # Delete expired registration drafts
//! agrisathi-cli drafts purge
//!
//! # Clear cache keys matching a glob pattern
//! agrisathi-cli cache clear 'user:profile:*'
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `drafts purge` - Delete expired registration drafts
//! - `cache clear` - Delete cache keys by pattern

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "agrisathi-cli")]
#[command(author, version, about = "AgriSathi CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Maintain registration drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },
    /// Administer the shared cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum DraftsAction {
    /// Delete drafts past their expiry
    Purge,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete keys matching a glob pattern
    Clear {
        /// Glob pattern, `*` matches any run of characters
        pattern: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Drafts { action } => match action {
            DraftsAction::Purge => commands::drafts::purge().await?,
        },
        Commands::Cache { action } => match action {
            CacheAction::Clear { pattern } => commands::cache::clear(&pattern).await?,
        },
    }
    Ok(())
}

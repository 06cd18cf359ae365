//! hubindex CLI
//!
//! Operator tools for the search indices of a content hub.
//!
//! # Commands
//!
//! - `rebuild` - Rebuild every index of an endpoint from an element snapshot
//! - `ensure` - Create missing indices and migrate changed mappings
//! - `clear` - Drop all documents, keeping mappings
//! - `teardown` - Delete every index and alias of an endpoint
//! - `status` - Show the live index behind each alias
//! - `prune` - Delete stale indices left by interrupted migrations

mod client;
mod commands;
mod config;

use clap::{Parser, Subcommand};
use client::{Credentials, ReqwestClient};
use config::CliConfig;
use hubindex_core::{IndexManager, RebuildStrategy};
use hubindex_engine::HttpEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// hubindex command-line index tools.
#[derive(Parser)]
#[command(name = "hubindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long, env = "HUBINDEX_CONFIG", default_value = "hubindex.json")]
    config: PathBuf,

    /// Search engine base URL
    #[arg(global = true, short, long, env = "HUBINDEX_URL", default_value = "http://localhost:9200")]
    url: String,

    /// Basic auth user name
    #[arg(global = true, long, env = "HUBINDEX_USERNAME")]
    username: Option<String>,

    /// Basic auth password
    #[arg(global = true, long, env = "HUBINDEX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Timeout in seconds of the data copy during a mapping migration
    #[arg(global = true, long, default_value = "3600")]
    reindex_timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild every index of an endpoint
    Rebuild {
        /// Endpoint name
        endpoint: String,

        /// Element snapshot (JSON array of elements)
        #[arg(short, long)]
        elements: PathBuf,

        /// Rebuild strategy (staged, clear-first)
        #[arg(short, long, default_value = "staged")]
        strategy: RebuildStrategy,
    },

    /// Create missing indices and migrate changed mappings
    Ensure {
        /// Endpoint name
        endpoint: String,
    },

    /// Drop all documents of an endpoint, keeping mappings
    Clear {
        /// Endpoint name
        endpoint: String,
    },

    /// Delete every index and alias of an endpoint
    Teardown {
        /// Endpoint name
        endpoint: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show the live index behind each alias
    Status {
        /// Endpoint name
        endpoint: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete stale indices left by interrupted migrations
    Prune {
        /// Endpoint name
        endpoint: String,
    },

    /// Show version information
    Version,
}

type Manager = IndexManager<HttpEngine<ReqwestClient>>;

fn manager(cli: &Cli, config: &CliConfig, strategy: RebuildStrategy) -> Result<Manager, Box<dyn std::error::Error>> {
    let credentials = cli.username.clone().map(|username| Credentials {
        username,
        password: cli.password.clone(),
    });
    let client = ReqwestClient::new(Duration::from_secs(cli.timeout), credentials)?;
    let engine = Arc::new(
        HttpEngine::new(cli.url.clone(), client)
            .with_reindex_timeout(Duration::from_secs(cli.reindex_timeout)),
    );
    Ok(IndexManager::new(engine, config.indexer_config(strategy)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("hubindex CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = CliConfig::load(&cli.config)?;

    match &cli.command {
        Commands::Rebuild {
            endpoint,
            elements,
            strategy,
        } => {
            let endpoint = config.endpoint(endpoint)?;
            let store = config::load_elements(elements)?;
            let manager = Arc::new(manager(&cli, &config, *strategy)?);
            commands::rebuild::run(manager, store, endpoint)?;
        }
        Commands::Ensure { endpoint } => {
            let endpoint = config.endpoint(endpoint)?;
            commands::ensure::run(&manager(&cli, &config, RebuildStrategy::default())?, endpoint)?;
        }
        Commands::Clear { endpoint } => {
            let endpoint = config.endpoint(endpoint)?;
            commands::clear::run(&manager(&cli, &config, RebuildStrategy::default())?, endpoint)?;
        }
        Commands::Teardown { endpoint, yes } => {
            let manager = manager(&cli, &config, RebuildStrategy::default())?;
            commands::teardown::run(&manager, endpoint, *yes)?;
        }
        Commands::Status { endpoint, format } => {
            let endpoint = config.endpoint(endpoint)?;
            let manager = manager(&cli, &config, RebuildStrategy::default())?;
            commands::status::run(&manager, endpoint, format)?;
        }
        Commands::Prune { endpoint } => {
            let endpoint = config.endpoint(endpoint)?;
            commands::prune::run(&manager(&cli, &config, RebuildStrategy::default())?, endpoint)?;
        }
        Commands::Version => {}
    }

    Ok(())
}

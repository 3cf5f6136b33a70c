//! querylens CLI - parse furniture queries and serve the HTTP API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

/// querylens - structured furniture queries from a small language model
#[derive(Parser)]
#[command(name = "querylens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, env = "QUERYLENS_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, env = "QUERYLENS_PORT", default_value_t = 8000)]
        port: u16,
        /// Load the model before accepting requests
        #[arg(long)]
        preload: bool,
    },

    /// Parse a single query and print the record
    Parse {
        /// Free-form furniture query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Use the keyword classifier instead of the model
        #[arg(long)]
        keywords: bool,
    },

    /// Manage local models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Manage the query cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show configuration and installation details
    Info,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List installed models
    List,
    /// Download the default model, or install a local GGUF file
    Pull {
        /// Install from this .gguf file instead of downloading
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Delete an installed model
    Remove {
        /// Model file name, with or without the .gguf extension
        name: String,
    },
    /// Show model paths and defaults
    Info,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete all entries from the disk cache
    Clear,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    logging::init(cli.verbose, default_level);

    match cli.command {
        Commands::Serve {
            host,
            port,
            preload,
        } => runtime()?.block_on(commands::serve::run(&host, port, preload)),
        Commands::Parse {
            query,
            json,
            keywords,
        } => runtime()?.block_on(commands::parse::run(&query, json, keywords)),
        Commands::Model { command } => match command {
            ModelCommands::List => commands::model::list(),
            ModelCommands::Pull { path } => {
                runtime()?.block_on(commands::model::pull(path.as_deref()))
            }
            ModelCommands::Remove { name } => commands::model::remove(&name),
            ModelCommands::Info => commands::model::info(),
        },
        Commands::Cache { command } => match command {
            CacheCommands::Clear => commands::cache::clear(),
        },
        Commands::Info => commands::info::run(),
    }
}

fn runtime() -> miette::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))
}

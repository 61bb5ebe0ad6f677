//! trainmap CLI - Command-line interface
//!
//! Runs a live train map session against a feed and backend, fetches single
//! trips, and manages the configuration file.

mod commands;
mod error;
mod runner;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::watch::WatchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "trainmap", version, about = "Live train positions on a map")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Follow the live feed and keep a map session in sync
    Watch {
        /// Feed WebSocket URL (overrides [feed] url)
        #[arg(long)]
        feed: Option<String>,

        /// Backend API base URL (overrides [api] url)
        #[arg(long)]
        api: Option<String>,

        /// Vehicle to auto-select: an id, `#id` or a URL with a fragment
        #[arg(long)]
        select: Option<String>,
    },

    /// Fetch one trip and print its stops
    Trip {
        /// Trip id as used by the feed
        id: String,

        /// Backend API base URL (overrides [api] url)
        #[arg(long)]
        api: Option<String>,
    },

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Watch { feed, api, select } => commands::watch::run(WatchArgs { feed, api, select }),
        Commands::Trip { id, api } => commands::trip::run(&id, api),
        Commands::Init { force } => commands::init::run(force),
        Commands::Config { command } => commands::config::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

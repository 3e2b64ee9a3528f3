// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Askdb - a natural-language-to-SQL conversational service core.
//!
//! This is the binary entry point for the Askdb engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;

/// Askdb - a natural-language-to-SQL conversational service core.
#[derive(Parser, Debug)]
#[command(name = "askdb", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the query-processing engine.
    Serve,
    /// Load and validate the configuration, then exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => askdb_config::load_config_from_path(path),
        None => askdb_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(errors) = askdb_config::validate(&config) {
        for error in &errors {
            eprintln!("error: {error}");
        }
        std::process::exit(2);
    }

    match cli.command {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check => {
            println!("configuration ok");
        }
    }
}

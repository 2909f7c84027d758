//! easync CLI
//!
//! Command-line tools for debugging sync traffic.
//!
//! # Commands
//!
//! - `decode` - Dump a captured WBXML document as text or JSON
//! - `status` - Classify a protocol status code for a command
//! - `folders` - Run a folder sync against a live server and list folders

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// easync command-line tools.
#[derive(Parser)]
#[command(name = "easync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a WBXML document
    Decode {
        /// File holding the raw document
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Classify a status code
    Status {
        /// Command name (FolderSync, Sync, Ping, MoveItems, Search)
        command: String,

        /// Status code from the response
        code: i32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Sync the folder hierarchy of an account and list its folders
    Folders {
        /// Account configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Include hidden folders
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Decode { file, format } => {
            commands::decode::run(&file, &format)?;
        }
        Commands::Status {
            command,
            code,
            format,
        } => {
            commands::status::run(&command, code, &format)?;
        }
        Commands::Folders {
            config,
            all,
            format,
        } => {
            commands::folders::run(&config, all, &format)?;
        }
        Commands::Version => {
            println!("easync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

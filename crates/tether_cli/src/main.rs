//! Tether CLI
//!
//! Developer tools for inspecting Tether sync bodies.
//!
//! # Commands
//!
//! - `parse` - Show the fields of a protocol4 body
//! - `batch` - Decode a batch body into items
//! - `encrypt` - Seal a single value
//! - `decrypt` - Open a single sealed value

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tether sync debugging tools.
#[derive(Parser)]
#[command(name = "tether")]
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
    /// Show the fields of a protocol4 body
    Parse {
        /// File holding the body
        file: PathBuf,

        /// Honour length prefixes and fail on framing errors
        #[arg(short, long)]
        strict: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode a batch body into items
    Batch {
        /// File holding the body
        file: PathBuf,

        /// Base64 field key, to open sealed properties
        #[arg(short, long)]
        key: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Seal a single value
    Encrypt {
        /// Base64 field key (20 or 32 bytes)
        #[arg(short, long)]
        key: String,

        /// Cipher context, usually the item's lookup key
        #[arg(short, long)]
        context: String,

        /// The plaintext
        value: String,
    },

    /// Open a single sealed value
    Decrypt {
        /// Base64 field key (20 or 32 bytes)
        #[arg(short, long)]
        key: String,

        /// Cipher context the value was sealed with
        #[arg(short, long)]
        context: String,

        /// The sealed value
        value: String,
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
        Commands::Parse {
            file,
            strict,
            format,
        } => {
            commands::parse::run(&file, strict, &format)?;
        }
        Commands::Batch { file, key, format } => {
            commands::batch::run(&file, key.as_deref(), &format)?;
        }
        Commands::Encrypt {
            key,
            context,
            value,
        } => {
            commands::seal::encrypt(&key, &context, &value)?;
        }
        Commands::Decrypt {
            key,
            context,
            value,
        } => {
            commands::seal::decrypt(&key, &context, &value)?;
        }
        Commands::Version => {
            println!("Tether CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Tether Core v{}", tether_core::VERSION);
        }
    }

    Ok(())
}

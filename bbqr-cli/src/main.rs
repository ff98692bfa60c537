//! bbqr: encode payloads into BBQr fragments and decode scanned fragments.
//!
//! Fragments are plain text lines; rendering them as QR codes and scanning
//! them back is left to other tools.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{debug, error};

mod commands;
mod config;
mod logging;

use commands::{DecodeArgs, EncodeArgs, InspectArgs};

/// Default number of days rotated log files are kept.
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

/// bbqr - split payloads into QR-sized BBQr fragments and back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (defaults to ./bbqr.toml when present)
    #[arg(short = 'f', long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long, global = true)]
    log_retention_days: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a payload into fragments, one per line
    Encode(EncodeArgs),
    /// Rebuild a payload from fragment lines
    Decode(DecodeArgs),
    /// Show the header of each fragment
    Inspect(InspectArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let (file_config, config_path) = match config::resolve_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load config file: {}", e);
            return Err(e.into());
        }
    };

    // Command line takes precedence over the file
    let log_dir = args.log_dir.or(file_config.logging.log_dir);
    let retention_days = args
        .log_retention_days
        .or(file_config.logging.retention_days)
        .unwrap_or(DEFAULT_LOG_RETENTION_DAYS);
    logging::init_logging(
        log_dir.as_deref(),
        retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    if let Some(path) = &config_path {
        debug!("Loaded config from: {}", path.display());
    }

    let result = match args.command {
        Command::Encode(encode_args) => commands::encode(encode_args, file_config.encoder).await,
        Command::Decode(decode_args) => commands::decode(decode_args, file_config.decoder).await,
        Command::Inspect(inspect_args) => commands::inspect(inspect_args),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result?;
    Ok(())
}

//! treesync - rebuild a customer's asset tree and store it.
//!
//! Usage: `treesync <customer-id> [--config treesync.toml]`
//!
//! Exits 0 when the tree was stored, 1 on any failure.

mod cli;
mod config;
mod observability;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Not an error if .env doesn't exist
    if let Err(e) = dotenvy::dotenv() {
        let not_found = matches!(
            e,
            dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound
        );
        if !not_found {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let cfg = match config::load_config(cli.config.as_deref(), &cli.overrides()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&cfg.logging) {
        eprintln!("Logging setup failed: {e:#}");
        return ExitCode::FAILURE;
    }

    match pipeline::run_from_config(&cli.customer_id, &cfg).await {
        Ok(report) => {
            if !report.persisted.verified() {
                warn!(session_id = %report.session_id, "stored tree could not be verified");
            }
            info!(
                session_id = %report.session_id,
                total_assets = report.summary.total_assets,
                "tree stored"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(customer_id = %cli.customer_id, "structure creation failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

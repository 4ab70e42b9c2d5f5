//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `measurement_etl` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use measurement_etl::initialization::init_logger_with;
use measurement_etl::{run_tasks, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting ETL_PROJECT / ETL_ACCESS_TOKEN in .env without
    // exporting them manually
    let _ = dotenvy::dotenv();

    // Parse command-line arguments into Config
    let config = Config::parse();

    // Initialize logger based on config
    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    // Run all task files using the library
    match run_tasks(config).await {
        Ok(report) => {
            println!(
                "Processed {} task file{} ({} failed): {} rows accepted, {} dropped, {} parse errors in {:.1}s",
                report.tasks,
                if report.tasks == 1 { "" } else { "s" },
                report.failed_tasks,
                report.rows_accepted,
                report.rows_dropped,
                report.parse_errors,
                report.elapsed_seconds
            );
            if report.failed_tasks > 0 {
                process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("measurement_etl error: {:#}", e);
            process::exit(1);
        }
    }
}

//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `http_trace` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing summary output
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use http_trace::initialization::init_logger_with;
use http_trace::{run_trace, Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments into Config
    let config = Config::parse();

    // Initialize logger based on config
    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let output = config.output;
    match run_trace(config).await {
        Ok(report) => {
            // Keep stdout pure JSON in json mode
            if output == OutputFormat::Plain {
                println!(
                    "\n{} attempt{} ({} reused, {} failed) in {:.3}s",
                    report.attempts.len(),
                    if report.attempts.len() == 1 { "" } else { "s" },
                    report.reused,
                    report.failed,
                    report.elapsed_seconds
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("http_trace error: {:#}", e);
            process::exit(1);
        }
    }
}

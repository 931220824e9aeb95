//! http_trace library: client-side HTTP request tracing
//!
//! This library records the lifecycle of outbound HTTP requests (connection
//! acquisition, DNS resolution, TCP connect, first response byte and the return
//! of the connection to the idle pool) as timestamped events, and classifies
//! each attempt's connection as freshly established or reused from the pool.
//!
//! # Example
//!
//! ```no_run
//! use http_trace::{run_trace, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     url: "https://example.com".to_string(),
//!     attempts: 2,
//!     ..Default::default()
//! };
//!
//! let report = run_trace(config).await?;
//! println!("{} attempts, {} on a reused connection",
//!          report.attempts.len(), report.reused);
//! # Ok(())
//! # }
//! ```
//!
//! Lower-level building blocks are public as well: implement
//! [`transport::Transport`] to trace something other than `reqwest`, or drive
//! a [`RequestAttemptRunner`] directly to collect [`Attempt`]s.
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod config;
pub mod error_handling;
pub mod export;
pub mod initialization;
pub mod runner;
pub mod trace;
pub mod tracker;
pub mod transport;

// Re-export public API
pub use config::{BodyPolicy, Config, LogFormat, LogLevel, OutputFormat};
pub use run::{run_trace, TraceReport};
pub use runner::{Attempt, AttemptState, RequestAttemptRunner};
pub use trace::{Event, EventKind, TraceHookSet, TraceHooks};
pub use tracker::{ConnectionDisposal, ConnectionVerdict};

// Internal run module (drives the CLI demo flow)
mod run {
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::{debug, info};

    use crate::config::{Config, OutputFormat};
    use crate::export::{self, plain};
    use crate::runner::{Attempt, AttemptObserver, RequestAttemptRunner};
    use crate::trace::Event;
    use crate::tracker::ConnectionVerdict;
    use crate::transport::ReqwestTransport;

    /// Results of a tracing run.
    #[derive(Debug, Clone)]
    pub struct TraceReport {
        /// Every attempt, in issue order
        pub attempts: Vec<Attempt>,
        /// Attempts that reused a pooled connection
        pub reused: usize,
        /// Attempts that ended with an error
        pub failed: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs `config.attempts` sequential attempts against `config.url`,
    /// printing each event to stdout as it fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built. Failures of individual attempts are not errors; they
    /// are recorded on the returned attempts.
    pub async fn run_trace(config: Config) -> Result<TraceReport> {
        config.validate().context("Invalid configuration")?;
        let request = config.request().context("Invalid target URL")?;
        let format = config.output;

        let transport =
            ReqwestTransport::from_config(&config).context("Failed to initialize HTTP client")?;
        let observer: AttemptObserver = Arc::new(move |sequence: usize, event: &Event| {
            match export::render_event(format, Some(sequence), event) {
                Ok(line) => {
                    if let Err(e) = export::emit(&line) {
                        debug!("Failed to write event: {}", e);
                    }
                }
                Err(e) => debug!("Failed to render event: {}", e),
            }
        });
        let runner = RequestAttemptRunner::new(Arc::new(transport))
            .with_body_policy(config.body)
            .with_observer(observer);

        let start = Instant::now();
        let mut attempts = Vec::with_capacity(config.attempts);
        for sequence in 1..=config.attempts {
            if format == OutputFormat::Plain {
                let separator = if sequence == 1 { "" } else { "\n" };
                export::emit(&format!(
                    "{}{}\n",
                    separator,
                    plain::header(sequence, &request)
                ))
                .context("Failed to write output")?;
            }
            let attempt = runner.run_attempt(&request).await;
            let outcome = export::render_outcome(format, &attempt)
                .context("Failed to render attempt outcome")?;
            export::emit(&outcome).context("Failed to write output")?;
            attempts.push(attempt);
        }

        let reused = attempts
            .iter()
            .filter(|a| a.verdict() == ConnectionVerdict::Reused)
            .count();
        let failed = attempts.iter().filter(|a| a.error().is_some()).count();
        let elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Finished {} attempts in {:.2}s ({} reused, {} failed)",
            attempts.len(),
            elapsed_seconds,
            reused,
            failed
        );

        Ok(TraceReport {
            attempts,
            reused,
            failed,
            elapsed_seconds,
        })
    }
}

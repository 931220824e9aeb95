//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DEFAULT_ATTEMPTS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_URL,
    DEFAULT_USER_AGENT, MAX_ATTEMPTS, MAX_TIMEOUT_SECS,
};
use crate::error_handling::ConfigError;
use crate::transport::RequestDescriptor;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// How captured events are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per event, `Kind(payload) 12ms`
    Plain,
    /// One JSON object per event
    Json,
}

/// What the runner does with a response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BodyPolicy {
    /// Read the body to the end and close it so the connection can be pooled
    Drain,
    /// Never read the body; the connection is not returned to the pool
    Abandon,
}

/// Run configuration.
///
/// Parsed from the command line by the binary, or built programmatically:
///
/// ```no_run
/// use http_trace::Config;
///
/// let config = Config {
///     url: "http://127.0.0.1:8080/".to_string(),
///     attempts: 3,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "http_trace",
    version,
    about = "Trace DNS, connect, first-byte and connection reuse timings of HTTP requests"
)]
pub struct Config {
    /// URL to request
    #[arg(default_value = DEFAULT_URL)]
    pub url: String,

    /// Number of sequential attempts with the same request
    #[arg(short = 'n', long, default_value_t = DEFAULT_ATTEMPTS)]
    pub attempts: usize,

    /// Whether to drain each response body or abandon it unread
    #[arg(long, value_enum, default_value_t = BodyPolicy::Drain)]
    pub body: BodyPolicy,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_seconds: u64,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Event output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub output: OutputFormat,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            attempts: DEFAULT_ATTEMPTS,
            body: BodyPolicy::Drain,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output: OutputFormat::Plain,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Checks ranges and the target URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("attempts", self.attempts as u64, 1, MAX_ATTEMPTS as u64)?;
        check_range("timeout_seconds", self.timeout_seconds, 1, MAX_TIMEOUT_SECS)?;
        check_range(
            "connect_timeout_seconds",
            self.connect_timeout_seconds,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        self.request().map(|_| ())
    }

    /// The request descriptor for the configured URL.
    pub fn request(&self) -> Result<RequestDescriptor, ConfigError> {
        RequestDescriptor::parse(&self.url)
    }
}

fn check_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

//! Configuration constants.
//!
//! This module defines the defaults and limits used throughout the crate.

use std::time::Duration;

/// Target requested when no URL is given on the command line.
pub const DEFAULT_URL: &str = "https://example.com";

/// Sequential attempts per run. Two attempts show a fresh connection followed
/// by a pooled one.
pub const DEFAULT_ATTEMPTS: usize = 2;
/// Upper bound on attempts per run
pub const MAX_ATTEMPTS: usize = 100;

/// Per-request timeout in seconds (whole request, including body)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// TCP connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Upper bound for either timeout in seconds
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str = concat!("http_trace/", env!("CARGO_PKG_VERSION"));

/// Pause after a drained body so hyper's pool has the connection back before
/// the next sequential attempt checks it out.
pub const POOL_SETTLE_DELAY: Duration = Duration::from_millis(50);

//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, limits, timeouts)
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{BodyPolicy, Config, LogFormat, LogLevel, OutputFormat};

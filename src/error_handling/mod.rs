//! Error handling.
//!
//! This module provides:
//! - Error type definitions (initialization, configuration, transport, attempt)
//! - Observer faults raised inside hook bodies
//! - Categorization of `reqwest` errors into transport error kinds
//!
//! Transport errors become the terminal error of exactly one attempt. Observer
//! faults are contained where they happen and only ever logged and counted.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{
    categorize_reqwest_error, error_chain_message, transport_error_from_reqwest,
};
pub use types::{
    AttemptError, ConfigError, InitializationError, ObserverFault, TransportError,
    TransportErrorKind,
};

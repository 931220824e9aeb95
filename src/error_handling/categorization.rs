//! Error categorization.
//!
//! This module maps `reqwest` failures onto [`TransportErrorKind`]s and renders
//! error source chains into single-line messages.

use std::error::Error as StdError;

use super::types::{TransportError, TransportErrorKind};

/// Categorizes a `reqwest::Error` into a `TransportErrorKind`.
///
/// `reqwest` reports resolver failures as connect errors; callers that know DNS
/// failed (the tracing resolver does) refine the result to
/// [`TransportErrorKind::Dns`] themselves.
///
/// # Arguments
///
/// * `error` - The `reqwest::Error` to categorize
///
/// # Returns
///
/// The appropriate `TransportErrorKind` for the error.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_builder() || error.is_request() || error.is_redirect() {
        TransportErrorKind::Request
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    }
}

/// Builds a `TransportError` from a `reqwest::Error`, keeping the full source chain
/// in the message.
pub fn transport_error_from_reqwest(error: &reqwest::Error) -> TransportError {
    TransportError::new(categorize_reqwest_error(error), error_chain_message(error))
}

/// Joins an error and all of its sources into one line (`outer: inner: root`).
///
/// Consecutive duplicates are skipped; some libraries repeat the source text in
/// their own `Display`.
pub fn error_chain_message(error: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = vec![error.to_string()];
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if parts.last().map(|last| !last.contains(&text)).unwrap_or(true) {
            parts.push(text);
        }
        source = err.source();
    }
    parts.join(": ")
}

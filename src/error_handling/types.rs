//! Error type definitions.
//!
//! This module defines all error types used throughout the crate: setup
//! failures, transport failures, per-attempt terminal errors and contained
//! observer faults.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::trace::EventKind;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Error types for configuration validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The target URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The target URL uses a scheme other than http or https.
    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    /// A numeric option is out of range.
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Where in the transport a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum TransportErrorKind {
    /// Name resolution failed
    Dns,
    /// TCP/TLS connection establishment failed
    Connect,
    /// The transport's own timeout fired
    Timeout,
    /// The request could not be built or written
    Request,
    /// The response failed after its first byte arrived.
    ///
    /// The reqwest transport only learns about a response once its head is
    /// parsed, so a truncated head surfaces there as `Request` instead.
    Response,
    /// Reading or closing the response body failed
    Body,
    /// Anything the transport did not classify
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Dns => "DNS error",
            TransportErrorKind::Connect => "connect error",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request error",
            TransportErrorKind::Response => "response error",
            TransportErrorKind::Body => "body error",
            TransportErrorKind::Other => "transport error",
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the underlying transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Classification of the failure
    pub kind: TransportErrorKind,
    /// Human-readable description, including the source chain
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal error of a single attempt.
///
/// Every variant is scoped to exactly one attempt; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The request never produced a response (DNS, connect, timeout before headers).
    #[error("dispatch failed: {0}")]
    Dispatch(TransportError),

    /// The response failed after GotFirstResponseByte fired.
    #[error("response failed: {0}")]
    Response(TransportError),

    /// Reading or closing the body failed; the connection is not returned to the pool.
    #[error("body drain failed: {0}")]
    Drain(TransportError),
}

impl AttemptError {
    /// Wraps a failed dispatch. Failures after the first response byte are
    /// response-phase errors whatever their kind.
    pub fn from_dispatch(error: TransportError, after_first_byte: bool) -> Self {
        if after_first_byte {
            AttemptError::Response(error)
        } else {
            AttemptError::Dispatch(error)
        }
    }

    pub fn transport_error(&self) -> &TransportError {
        match self {
            AttemptError::Dispatch(e) | AttemptError::Response(e) | AttemptError::Drain(e) => e,
        }
    }
}

/// A fault raised inside a hook body.
///
/// Observer faults are logged and counted on the attempt; they never reach the
/// transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("observer fault in {kind} hook: {message}")]
pub struct ObserverFault {
    /// Hook that was running when the fault happened
    pub kind: EventKind,
    /// Panic message or lock failure description
    pub message: String,
}

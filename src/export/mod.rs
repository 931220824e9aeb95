//! Rendering of captured attempts.
//!
//! Pure functions of an [`Attempt`](crate::runner::Attempt) (or a single
//! event) into text, in two formats:
//! - `plain`: Go `httptrace`-style lines such as `GetConn(example.com:443) 0ms`
//! - `jsonl`: one JSON object per line, for programmatic processing

pub mod jsonl;
pub mod plain;
mod writer;

pub use writer::emit;

use crate::config::OutputFormat;
use crate::runner::Attempt;
use crate::trace::Event;

/// Renders one event in `format`.
///
/// `attempt` is only used by JSON output.
pub fn render_event(
    format: OutputFormat,
    attempt: Option<usize>,
    event: &Event,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Plain => Ok(plain::format_event(event)),
        OutputFormat::Json => jsonl::format_event(attempt, event),
    }
}

/// Renders the outcome of a finished attempt in `format`.
pub fn render_outcome(format: OutputFormat, attempt: &Attempt) -> serde_json::Result<String> {
    match format {
        OutputFormat::Plain => Ok(plain::format_outcome(attempt)),
        OutputFormat::Json => serde_json::to_string(&jsonl::summary_record(attempt)),
    }
}

/// Renders a finished attempt, events and outcome, in `format`.
pub fn render_attempt(format: OutputFormat, attempt: &Attempt) -> serde_json::Result<String> {
    match format {
        OutputFormat::Plain => Ok(plain::format_attempt(attempt)),
        OutputFormat::Json => jsonl::format_attempt(attempt),
    }
}

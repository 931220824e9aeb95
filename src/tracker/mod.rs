//! Connection lifecycle tracking.
//!
//! Correlates the connection-related events of one attempt (GetConn, the
//! Connect pairs, GotConn and PutIdleConn) into:
//! - a verdict: was the connection freshly established or taken from the pool
//! - a disposal: what happened to the connection after the body was drained
//!
//! The `reused` flag carried by GotConn is ground truth. ConnectStart presence is
//! only corroborating evidence: a disagreement is reported as a diagnostic and
//! never changes the verdict.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::trace::{ConnectionDescriptor, Event, EventPayload};

/// How the attempt acquired its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionVerdict {
    /// A new connection was established for this attempt
    New,
    /// An idle pooled connection was reused
    Reused,
    /// The attempt failed before a connection was handed out
    Unknown,
}

impl fmt::Display for ConnectionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionVerdict::New => "new",
            ConnectionVerdict::Reused => "reused",
            ConnectionVerdict::Unknown => "unknown",
        })
    }
}

/// What happened to the connection once the attempt was done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionDisposal {
    /// PutIdleConn fired without error; the connection is in the idle pool
    Pooled,
    /// PutIdleConn fired with an error; the connection was closed instead
    Discarded(String),
    /// PutIdleConn never fired (body not drained, or the attempt failed)
    NotReturned,
}

impl fmt::Display for ConnectionDisposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDisposal::Pooled => f.write_str("pooled"),
            ConnectionDisposal::Discarded(reason) => write!(f, "discarded ({})", reason),
            ConnectionDisposal::NotReturned => f.write_str("not returned"),
        }
    }
}

/// Accumulates connection evidence for a single attempt.
#[derive(Debug, Clone, Default)]
pub struct ConnectionLifecycleTracker {
    host_port: Option<String>,
    dns_lookups: usize,
    connect_starts: usize,
    connect_dones: usize,
    failed_connects: usize,
    got_conn: Option<ConnectionDescriptor>,
    put_idle: Option<Option<String>>,
}

impl ConnectionLifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tracker from a complete event sequence.
    pub fn from_events(events: &[Event]) -> Self {
        let mut tracker = Self::new();
        for event in events {
            tracker.observe(event);
        }
        tracker
    }

    /// Feeds one event. Events unrelated to the connection lifecycle are ignored.
    pub fn observe(&mut self, event: &Event) {
        match &event.payload {
            EventPayload::GetConn { host_port } => self.host_port = Some(host_port.clone()),
            EventPayload::DnsStart { .. } => self.dns_lookups += 1,
            EventPayload::ConnectStart { .. } => self.connect_starts += 1,
            EventPayload::ConnectDone { error, .. } => {
                self.connect_dones += 1;
                if error.is_some() {
                    self.failed_connects += 1;
                }
            }
            EventPayload::GotConn(info) => self.got_conn = Some(info.clone()),
            EventPayload::PutIdleConn { error } => self.put_idle = Some(error.clone()),
            EventPayload::DnsDone { .. } | EventPayload::GotFirstResponseByte => {}
        }
    }

    /// Classifies the connection acquisition. GotConn's flag decides; without a
    /// GotConn the verdict is `Unknown`.
    pub fn verdict(&self) -> ConnectionVerdict {
        match &self.got_conn {
            Some(info) if info.reused => ConnectionVerdict::Reused,
            Some(_) => ConnectionVerdict::New,
            None => ConnectionVerdict::Unknown,
        }
    }

    /// Whether ConnectStart presence agrees with the GotConn flag.
    ///
    /// `None` when GotConn never fired. A reused flag alongside a ConnectStart
    /// can legitimately happen when the pool wins a race against a dial that
    /// keeps running in the background.
    pub fn corroborated(&self) -> Option<bool> {
        self.got_conn
            .as_ref()
            .map(|info| info.reused == (self.connect_starts == 0))
    }

    /// Logs a warning when the evidence contradicts the flag. Returns whether it did.
    pub fn report_contradiction(&self) -> bool {
        if self.corroborated() == Some(false) {
            warn!(
                "GotConn for {} reported reused={} but {} ConnectStart event(s) were observed; trusting the flag",
                self.host_port.as_deref().unwrap_or("<unknown>"),
                self.got_conn.as_ref().map(|i| i.reused).unwrap_or(false),
                self.connect_starts
            );
            return true;
        }
        false
    }

    pub fn disposal(&self) -> ConnectionDisposal {
        match &self.put_idle {
            Some(None) => ConnectionDisposal::Pooled,
            Some(Some(reason)) => ConnectionDisposal::Discarded(reason.clone()),
            None => ConnectionDisposal::NotReturned,
        }
    }

    pub fn host_port(&self) -> Option<&str> {
        self.host_port.as_deref()
    }

    pub fn connection(&self) -> Option<&ConnectionDescriptor> {
        self.got_conn.as_ref()
    }

    pub fn dns_performed(&self) -> bool {
        self.dns_lookups > 0
    }

    pub fn connect_starts(&self) -> usize {
        self.connect_starts
    }

    pub fn connect_dones(&self) -> usize {
        self.connect_dones
    }

    pub fn failed_connects(&self) -> usize {
        self.failed_connects
    }
}

//! Lifecycle event kinds, payloads and connection descriptors.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Serialize, Serializer};
use strum_macros::EnumIter as EnumIterMacro;

/// The fixed enumeration of lifecycle points a transport reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize)]
pub enum EventKind {
    /// Connection acquisition for a host:port begins.
    GetConn,
    /// Name resolution begins.
    #[serde(rename = "DNSStart")]
    DnsStart,
    /// Name resolution completed.
    #[serde(rename = "DNSDone")]
    DnsDone,
    /// A new TCP connection is being opened.
    ConnectStart,
    /// A TCP connection attempt completed.
    ConnectDone,
    /// The transport holds a usable connection.
    GotConn,
    /// The first response byte is readable.
    GotFirstResponseByte,
    /// The connection went back to the idle pool.
    PutIdleConn,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GetConn => "GetConn",
            EventKind::DnsStart => "DNSStart",
            EventKind::DnsDone => "DNSDone",
            EventKind::ConnectStart => "ConnectStart",
            EventKind::ConnectDone => "ConnectDone",
            EventKind::GotConn => "GotConn",
            EventKind::GotFirstResponseByte => "GotFirstResponseByte",
            EventKind::PutIdleConn => "PutIdleConn",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection identity as reported by the transport when it hands out a connection.
///
/// `reused` is supplied by the transport and is the authoritative answer to
/// "was this connection taken from the pool".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDescriptor {
    /// Connection was previously used for another request
    pub reused: bool,
    /// Connection was sitting idle in the pool
    pub was_idle: bool,
    /// How long the connection was idle, when the transport knows
    #[serde(
        rename = "idle_time_us",
        serialize_with = "serialize_opt_micros",
        skip_serializing_if = "Option::is_none"
    )]
    pub idle_time: Option<Duration>,
    /// Peer address of the connection, when the transport knows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<SocketAddr>,
    /// The transport did not see the checkout itself and reported it late;
    /// the event offset is an upper bound on when the connection was acquired
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub inferred: bool,
}

impl ConnectionDescriptor {
    /// Descriptor for a connection the transport just established.
    pub fn fresh(remote_addr: Option<SocketAddr>) -> Self {
        Self {
            reused: false,
            was_idle: false,
            idle_time: None,
            remote_addr,
            inferred: false,
        }
    }

    /// Descriptor for a connection checked out of the idle pool.
    pub fn pooled(remote_addr: Option<SocketAddr>, idle_time: Option<Duration>) -> Self {
        Self {
            reused: true,
            was_idle: true,
            idle_time,
            remote_addr,
            inferred: false,
        }
    }

    /// Marks the descriptor as reported after the fact.
    pub fn mark_inferred(mut self) -> Self {
        self.inferred = true;
        self
    }
}

fn serialize_opt_micros<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.serialize_u64(d.as_micros() as u64),
        None => serializer.serialize_none(),
    }
}

/// Hook-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    GetConn {
        host_port: String,
    },
    #[serde(rename = "DNSStart")]
    DnsStart {
        host: String,
    },
    #[serde(rename = "DNSDone")]
    DnsDone {
        addrs: Vec<IpAddr>,
        error: Option<String>,
    },
    ConnectStart {
        network: String,
        addr: String,
    },
    ConnectDone {
        network: String,
        addr: String,
        error: Option<String>,
    },
    GotConn(ConnectionDescriptor),
    GotFirstResponseByte,
    PutIdleConn {
        error: Option<String>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::GetConn { .. } => EventKind::GetConn,
            EventPayload::DnsStart { .. } => EventKind::DnsStart,
            EventPayload::DnsDone { .. } => EventKind::DnsDone,
            EventPayload::ConnectStart { .. } => EventKind::ConnectStart,
            EventPayload::ConnectDone { .. } => EventKind::ConnectDone,
            EventPayload::GotConn(_) => EventKind::GotConn,
            EventPayload::GotFirstResponseByte => EventKind::GotFirstResponseByte,
            EventPayload::PutIdleConn { .. } => EventKind::PutIdleConn,
        }
    }
}

/// One captured lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Offset from the attempt baseline
    pub offset: Duration,
    /// What happened
    pub payload: EventPayload,
}

impl Event {
    pub fn new(offset: Duration, payload: EventPayload) -> Self {
        Self { offset, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

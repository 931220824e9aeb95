//! Human-readable trace lines.

use std::fmt::Write;
use std::net::IpAddr;

use crate::runner::Attempt;
use crate::trace::{as_display_millis, ConnectionDescriptor, Event, EventPayload};
use crate::transport::RequestDescriptor;

const NIL: &str = "<nil>";

/// `# Request 1 to example.com`
pub fn header(sequence: usize, request: &RequestDescriptor) -> String {
    let host = request.host().unwrap_or_else(|| request.url().to_string());
    format!("# Request {} to {}", sequence, host)
}

/// One event as `Kind(args) Nms`.
pub fn format_event(event: &Event) -> String {
    let millis = as_display_millis(event.offset);
    match &event.payload {
        EventPayload::GetConn { host_port } => format!("GetConn({}) {}ms", host_port, millis),
        EventPayload::DnsStart { host } => format!("DNSStart({}) {}ms", host, millis),
        EventPayload::DnsDone { addrs, error } => format!(
            "DNSDone({}, {}) {}ms",
            format_addrs(addrs),
            or_nil(error.as_deref()),
            millis
        ),
        EventPayload::ConnectStart { network, addr } => {
            format!("ConnectStart({}, {}) {}ms", network, addr, millis)
        }
        EventPayload::ConnectDone {
            network,
            addr,
            error,
        } => format!(
            "ConnectDone({}, {}, {}) {}ms",
            network,
            addr,
            or_nil(error.as_deref()),
            millis
        ),
        EventPayload::GotConn(info) => format!("GotConn({}) {}ms", format_conn(info), millis),
        EventPayload::GotFirstResponseByte => format!("GotFirstResponseByte {}ms", millis),
        EventPayload::PutIdleConn { error } => {
            format!("PutIdleConn({}) {}ms", or_nil(error.as_deref()), millis)
        }
    }
}

/// Every event of the attempt, then the outcome lines.
pub fn format_attempt(attempt: &Attempt) -> String {
    let mut out = String::new();
    for event in attempt.events() {
        let _ = writeln!(out, "{}", format_event(event));
    }
    out.push_str(&format_outcome(attempt));
    out
}

/// Verdict, disposal and error of a finished attempt.
pub fn format_outcome(attempt: &Attempt) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Connection: {} ({})",
        attempt.verdict(),
        attempt.disposal()
    );
    if let Some(error) = attempt.error() {
        let _ = writeln!(out, "Error: {}", error);
    }
    out
}

fn or_nil(error: Option<&str>) -> &str {
    error.unwrap_or(NIL)
}

fn format_addrs(addrs: &[IpAddr]) -> String {
    let joined: Vec<String> = addrs.iter().map(ToString::to_string).collect();
    format!("[{}]", joined.join(" "))
}

fn format_conn(info: &ConnectionDescriptor) -> String {
    let idle = match info.idle_time {
        Some(idle) => format!("{:?}", idle),
        None => NIL.to_string(),
    };
    let mut out = format!(
        "{{Reused:{} WasIdle:{} IdleTime:{}",
        info.reused, info.was_idle, idle
    );
    if let Some(addr) = info.remote_addr {
        let _ = write!(out, " RemoteAddr:{}", addr);
    }
    if info.inferred {
        out.push_str(" Inferred:true");
    }
    out.push('}');
    out
}

//! Validation of an attempt's event sequence against the hook firing contract.
//!
//! Transports are expected to fire hooks in a fixed partial order. Rather than
//! assume every transport gets this right, attempts are checked after the fact
//! and any deviation is reported. Violations are diagnostics; they never fail an
//! attempt.

use thiserror::Error;

use crate::trace::event::{Event, EventKind, EventPayload};

/// A single deviation from the hook firing contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingViolation {
    #[error("first event is {found}, expected GetConn")]
    GetConnNotFirst { found: EventKind },

    #[error("{kind} fired {count} times, at most once allowed")]
    Duplicate { kind: EventKind, count: usize },

    #[error("{kind} at position {index} must come after {after}")]
    OutOfOrder {
        kind: EventKind,
        after: EventKind,
        index: usize,
    },

    #[error("DNSStart without a matching DNSDone")]
    UnpairedDnsStart,

    #[error("ConnectDone({network}, {addr}) at position {index} has no open ConnectStart")]
    ConnectDoneWithoutStart {
        network: String,
        addr: String,
        index: usize,
    },

    #[error("ConnectDone({found}) at position {index} does not match most recent ConnectStart({expected})")]
    ConnectMismatch {
        expected: String,
        found: String,
        index: usize,
    },

    #[error("ConnectStart({network}, {addr}) never completed")]
    UnmatchedConnectStart { network: String, addr: String },

    #[error("offset at position {index} is smaller than the previous offset")]
    OffsetDecreased { index: usize },
}

const SINGLE_SHOT: [EventKind; 6] = [
    EventKind::GetConn,
    EventKind::DnsStart,
    EventKind::DnsDone,
    EventKind::GotConn,
    EventKind::GotFirstResponseByte,
    EventKind::PutIdleConn,
];

/// Checks `events` against the firing contract and returns every violation found.
///
/// An empty sequence is valid: the transport failed before acquiring anything.
pub fn validate(events: &[Event]) -> Vec<OrderingViolation> {
    let mut violations = Vec::new();
    let Some(first) = events.first() else {
        return violations;
    };
    if first.kind() != EventKind::GetConn {
        violations.push(OrderingViolation::GetConnNotFirst {
            found: first.kind(),
        });
    }

    for kind in SINGLE_SHOT {
        let count = events.iter().filter(|e| e.kind() == kind).count();
        if count > 1 {
            violations.push(OrderingViolation::Duplicate { kind, count });
        }
    }

    let mut dns_started = false;
    let mut dns_done = false;
    let mut got_conn = false;
    let mut first_byte = false;
    let mut open_connects: Vec<(String, String)> = Vec::new();

    for (index, event) in events.iter().enumerate() {
        if index > 0 && event.offset < events[index - 1].offset {
            violations.push(OrderingViolation::OffsetDecreased { index });
        }
        let out_of_order = |after: EventKind| OrderingViolation::OutOfOrder {
            kind: event.kind(),
            after,
            index,
        };

        match &event.payload {
            EventPayload::GetConn { .. } => {}
            EventPayload::DnsStart { .. } => dns_started = true,
            EventPayload::DnsDone { .. } => {
                if !dns_started {
                    violations.push(out_of_order(EventKind::DnsStart));
                }
                dns_done = true;
            }
            EventPayload::ConnectStart { network, addr } => {
                if dns_started && !dns_done {
                    violations.push(out_of_order(EventKind::DnsDone));
                }
                open_connects.push((network.clone(), addr.clone()));
            }
            EventPayload::ConnectDone { network, addr, .. } => match open_connects.pop() {
                Some((open_network, open_addr)) => {
                    if &open_network != network || &open_addr != addr {
                        violations.push(OrderingViolation::ConnectMismatch {
                            expected: format!("{}, {}", open_network, open_addr),
                            found: format!("{}, {}", network, addr),
                            index,
                        });
                    }
                }
                None => violations.push(OrderingViolation::ConnectDoneWithoutStart {
                    network: network.clone(),
                    addr: addr.clone(),
                    index,
                }),
            },
            EventPayload::GotConn(_) => {
                if !open_connects.is_empty() {
                    violations.push(out_of_order(EventKind::ConnectDone));
                }
                got_conn = true;
            }
            EventPayload::GotFirstResponseByte => {
                if !got_conn {
                    violations.push(out_of_order(EventKind::GotConn));
                }
                first_byte = true;
            }
            EventPayload::PutIdleConn { .. } => {
                if !first_byte {
                    violations.push(out_of_order(EventKind::GotFirstResponseByte));
                }
            }
        }
    }

    if dns_started && !dns_done {
        violations.push(OrderingViolation::UnpairedDnsStart);
    }
    for (network, addr) in open_connects {
        violations.push(OrderingViolation::UnmatchedConnectStart { network, addr });
    }
    violations
}

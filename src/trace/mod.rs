//! Request lifecycle tracing primitives.
//!
//! This module provides:
//! - The per-attempt [`EventClock`]
//! - The fixed event model ([`EventKind`], [`EventPayload`], [`Event`])
//! - The [`TraceHooks`] capability interface transports call into
//! - [`TraceHookSet`], the recorder bound to one attempt
//! - Ordering validation of recorded sequences
//!
//! # Firing contract
//!
//! | Kind | Cardinality | Must come after |
//! |---|---|---|
//! | GetConn | exactly 1 | (first event) |
//! | DNSStart | 0 or 1 | GetConn |
//! | DNSDone | iff DNSStart | DNSStart |
//! | ConnectStart | 0..n | DNSDone, or GetConn without DNS |
//! | ConnectDone | one per ConnectStart | its ConnectStart |
//! | GotConn | 1, absent on dispatch failure | every ConnectDone |
//! | GotFirstResponseByte | 1, absent on failure | GotConn |
//! | PutIdleConn | 0 or 1 | GotFirstResponseByte and body drain |

pub mod clock;
pub mod event;
pub mod hooks;
pub mod ordering;

pub use clock::{as_display_millis, EventClock};
pub use event::{ConnectionDescriptor, Event, EventKind, EventPayload};
pub use hooks::{EventObserver, TraceHookSet, TraceHooks};
pub use ordering::{validate, OrderingViolation};

//! The result of one request attempt.

use std::time::{Duration, Instant};

use crate::error_handling::{AttemptError, ObserverFault};
use crate::runner::state::AttemptState;
use crate::trace::{ConnectionDescriptor, Event, EventKind, OrderingViolation};
use crate::tracker::{ConnectionDisposal, ConnectionVerdict};
use crate::transport::RequestDescriptor;

/// One end-to-end execution of a request.
///
/// Returned by the runner once the attempt is over; nothing can change it
/// afterwards. All accessors are read-only.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub(crate) sequence: usize,
    pub(crate) request: RequestDescriptor,
    pub(crate) baseline: Instant,
    pub(crate) events: Vec<Event>,
    pub(crate) state: AttemptState,
    pub(crate) verdict: ConnectionVerdict,
    pub(crate) disposal: ConnectionDisposal,
    pub(crate) corroborated: Option<bool>,
    pub(crate) error: Option<AttemptError>,
    pub(crate) status: Option<u16>,
    pub(crate) version: Option<String>,
    pub(crate) body_bytes: Option<u64>,
    pub(crate) observer_faults: Vec<ObserverFault>,
    pub(crate) violations: Vec<OrderingViolation>,
}

impl Attempt {
    /// 1-based position among the attempts issued by the same runner.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// Instant all event offsets are measured from.
    pub fn baseline(&self) -> Instant {
        self.baseline
    }

    /// Captured events in firing order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn verdict(&self) -> ConnectionVerdict {
        self.verdict
    }

    pub fn disposal(&self) -> &ConnectionDisposal {
        &self.disposal
    }

    /// Whether ConnectStart presence agreed with GotConn's reused flag.
    pub fn corroborated(&self) -> Option<bool> {
        self.corroborated
    }

    pub fn error(&self) -> Option<&AttemptError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Bytes read while draining, if the body was drained.
    pub fn body_bytes(&self) -> Option<u64> {
        self.body_bytes
    }

    pub fn observer_faults(&self) -> &[ObserverFault] {
        &self.observer_faults
    }

    /// Deviations from the hook firing contract seen in this attempt.
    pub fn ordering_violations(&self) -> &[OrderingViolation] {
        &self.violations
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn first(&self, kind: EventKind) -> Option<&Event> {
        self.events.iter().find(|e| e.kind() == kind)
    }

    /// The descriptor GotConn reported, if it fired.
    pub fn connection(&self) -> Option<&ConnectionDescriptor> {
        self.events.iter().find_map(|e| match &e.payload {
            crate::trace::EventPayload::GotConn(info) => Some(info),
            _ => None,
        })
    }

    /// Offset of the last captured event.
    pub fn last_offset(&self) -> Duration {
        self.events.last().map(|e| e.offset).unwrap_or_default()
    }

    pub fn succeeded(&self) -> bool {
        self.state == AttemptState::Closed
    }
}

#[cfg(test)]
impl Attempt {
    /// Builds a closed attempt around a hand-written event sequence.
    pub(crate) fn fixture(request: &str, events: Vec<Event>) -> Self {
        use crate::tracker::ConnectionLifecycleTracker;

        let tracker = ConnectionLifecycleTracker::from_events(&events);
        Attempt {
            sequence: 1,
            request: RequestDescriptor::parse(request).expect("fixture url"),
            baseline: Instant::now(),
            verdict: tracker.verdict(),
            disposal: tracker.disposal(),
            corroborated: tracker.corroborated(),
            violations: crate::trace::validate(&events),
            events,
            state: AttemptState::Closed,
            error: None,
            status: Some(200),
            version: Some("HTTP/1.1".to_string()),
            body_bytes: Some(0),
            observer_faults: Vec::new(),
        }
    }
}

//! Lifecycle hooks a transport invokes, and the recorder bound to one attempt.
//!
//! Hooks run on the transport's own execution path, so every method here must
//! return quickly and must never panic back into the transport. The recorder
//! holds its lock only long enough to push one event; faults in the recorder
//! or in a live observer are contained and reported as [`ObserverFault`]s.

use std::any::Any;
use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, trace};

use crate::error_handling::ObserverFault;
use crate::trace::clock::EventClock;
use crate::trace::event::{ConnectionDescriptor, Event, EventKind, EventPayload};

/// Callback invoked synchronously after each event is recorded.
pub type EventObserver = Arc<dyn Fn(&Event) + Send + Sync>;

/// Capability interface with one method per lifecycle event kind.
///
/// Transports call these at the lifecycle points described on [`EventKind`].
/// All methods default to no-ops, so a partial observer only overrides what it
/// cares about.
pub trait TraceHooks: Send + Sync {
    /// Connection acquisition for `host_port` begins.
    fn get_conn(&self, _host_port: &str) {}

    /// Name resolution for `host` begins.
    fn dns_start(&self, _host: &str) {}

    /// Name resolution finished with `addrs`, or failed with `error`.
    fn dns_done(&self, _addrs: &[IpAddr], _error: Option<&str>) {}

    /// A new connection to `addr` over `network` is being opened.
    fn connect_start(&self, _network: &str, _addr: &str) {}

    /// The connection attempt to `addr` finished, failed if `error` is set.
    fn connect_done(&self, _network: &str, _addr: &str, _error: Option<&str>) {}

    /// The transport holds a usable connection.
    fn got_conn(&self, _info: ConnectionDescriptor) {}

    /// The first response byte is readable.
    fn got_first_response_byte(&self) {}

    /// The connection was handed back to the pool, or discarded if `error` is set.
    fn put_idle_conn(&self, _error: Option<&str>) {}
}

#[derive(Default)]
struct Recording {
    events: Vec<Event>,
    sealed: bool,
}

/// The hook set bound to a single attempt.
///
/// Created fresh per attempt together with its [`EventClock`]; there is no way
/// to rebind it to another attempt. After [`TraceHookSet::seal`] every further
/// hook invocation is dropped.
pub struct TraceHookSet {
    clock: EventClock,
    recording: Mutex<Recording>,
    faults: Mutex<Vec<ObserverFault>>,
    observer: Option<EventObserver>,
}

impl TraceHookSet {
    pub fn new(clock: EventClock) -> Self {
        Self {
            clock,
            recording: Mutex::new(Recording::default()),
            faults: Mutex::new(Vec::new()),
            observer: None,
        }
    }

    /// Same as [`TraceHookSet::new`], additionally calling `observer` after every
    /// recorded event.
    pub fn with_observer(clock: EventClock, observer: EventObserver) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new(clock)
        }
    }

    pub fn clock(&self) -> EventClock {
        self.clock
    }

    /// Events recorded so far, in firing order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock_recording(None).events.clone()
    }

    /// Whether an event of `kind` has been recorded.
    pub fn has_fired(&self, kind: EventKind) -> bool {
        self.lock_recording(None)
            .events
            .iter()
            .any(|e| e.kind() == kind)
    }

    /// Stops recording and returns the final event sequence.
    pub fn seal(&self) -> Vec<Event> {
        let mut recording = self.lock_recording(None);
        recording.sealed = true;
        recording.events.clone()
    }

    /// Faults contained while recording or notifying the observer.
    pub fn observer_faults(&self) -> Vec<ObserverFault> {
        match self.faults.lock() {
            Ok(faults) => faults.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, payload: EventPayload) {
        let kind = payload.kind();
        let event = {
            let mut recording = self.lock_recording(Some(kind));
            if recording.sealed {
                debug!("Dropping {} hook fired after the attempt was sealed", kind);
                return;
            }
            // Offset is read under the lock so insertion order and offsets agree.
            let event = Event::new(self.clock.elapsed(), payload);
            recording.events.push(event.clone());
            event
        };
        trace!("{} at {:?}", kind, event.offset);

        if let Some(observer) = &self.observer {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer(&event))) {
                self.fault(kind, panic_message(panic.as_ref()));
            }
        }
    }

    fn lock_recording(&self, kind: Option<EventKind>) -> MutexGuard<'_, Recording> {
        match self.recording.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                if let Some(kind) = kind {
                    self.fault(kind, "event log lock was poisoned".to_string());
                }
                poisoned.into_inner()
            }
        }
    }

    fn fault(&self, kind: EventKind, message: String) {
        let fault = ObserverFault { kind, message };
        error!("{}", fault);
        match self.faults.lock() {
            Ok(mut faults) => faults.push(fault),
            Err(poisoned) => poisoned.into_inner().push(fault),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "observer panicked".to_string()
    }
}

impl TraceHooks for TraceHookSet {
    fn get_conn(&self, host_port: &str) {
        self.record(EventPayload::GetConn {
            host_port: host_port.to_string(),
        });
    }

    fn dns_start(&self, host: &str) {
        self.record(EventPayload::DnsStart {
            host: host.to_string(),
        });
    }

    fn dns_done(&self, addrs: &[IpAddr], error: Option<&str>) {
        self.record(EventPayload::DnsDone {
            addrs: addrs.to_vec(),
            error: error.map(str::to_string),
        });
    }

    fn connect_start(&self, network: &str, addr: &str) {
        self.record(EventPayload::ConnectStart {
            network: network.to_string(),
            addr: addr.to_string(),
        });
    }

    fn connect_done(&self, network: &str, addr: &str, error: Option<&str>) {
        self.record(EventPayload::ConnectDone {
            network: network.to_string(),
            addr: addr.to_string(),
            error: error.map(str::to_string),
        });
    }

    fn got_conn(&self, info: ConnectionDescriptor) {
        self.record(EventPayload::GotConn(info));
    }

    fn got_first_response_byte(&self) {
        self.record(EventPayload::GotFirstResponseByte);
    }

    fn put_idle_conn(&self, error: Option<&str>) {
        self.record(EventPayload::PutIdleConn {
            error: error.map(str::to_string),
        });
    }
}

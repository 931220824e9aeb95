//! Request attempt execution.
//!
//! The [`RequestAttemptRunner`] is the orchestrator: for each attempt it
//! creates a fresh [`EventClock`] and [`TraceHookSet`], dispatches the request
//! through the [`Transport`], then drains or abandons the body according to
//! its [`BodyPolicy`]. Once the attempt is over the hook set is sealed and the
//! captured events are summarized into an immutable [`Attempt`].
//!
//! Hook sets are never shared between attempts, so concurrent attempts cannot
//! see each other's events.

mod attempt;
mod state;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::config::BodyPolicy;
use crate::error_handling::AttemptError;
use crate::trace::{validate, Event, EventClock, EventKind, EventObserver, TraceHookSet};
use crate::tracker::ConnectionLifecycleTracker;
use crate::transport::{RequestDescriptor, Transport};

pub use attempt::Attempt;
pub use state::{AttemptState, InvalidTransition};

/// Live callback receiving each event with the sequence number of its attempt.
pub type AttemptObserver = Arc<dyn Fn(usize, &Event) + Send + Sync>;

/// Executes traced request attempts against a shared transport.
pub struct RequestAttemptRunner {
    transport: Arc<dyn Transport>,
    body_policy: BodyPolicy,
    observer: Option<AttemptObserver>,
    issued: AtomicUsize,
}

impl RequestAttemptRunner {
    /// Creates a runner that drains every body.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            body_policy: BodyPolicy::Drain,
            observer: None,
            issued: AtomicUsize::new(0),
        }
    }

    pub fn with_body_policy(mut self, body_policy: BodyPolicy) -> Self {
        self.body_policy = body_policy;
        self
    }

    /// Installs a callback that sees every event of every attempt as it fires.
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn body_policy(&self) -> BodyPolicy {
        self.body_policy
    }

    /// Runs one attempt to completion.
    ///
    /// Never fails as a whole: transport and drain errors end up in
    /// [`Attempt::error`] with the events captured up to that point.
    pub async fn run_attempt(&self, request: &RequestDescriptor) -> Attempt {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let target = request
            .host_port()
            .unwrap_or_else(|| request.url().to_string());
        let clock = EventClock::start();
        let hooks = Arc::new(match &self.observer {
            Some(observer) => {
                let observer = Arc::clone(observer);
                let bound: EventObserver =
                    Arc::new(move |event: &Event| observer(sequence, event));
                TraceHookSet::with_observer(clock, bound)
            }
            None => TraceHookSet::new(clock),
        });

        let mut state = AttemptState::Created;
        let mut failure: Option<AttemptError> = None;
        let mut status = None;
        let mut version = None;
        let mut body_bytes = None;

        transition(&mut state, AttemptState::Dispatched, sequence);
        match self.transport.dispatch(request, hooks.clone()).await {
            Err(e) => {
                warn!("Attempt {} to {} failed: {}", sequence, target, e);
                let after_first_byte = hooks.has_fired(EventKind::GotFirstResponseByte);
                if after_first_byte {
                    transition(&mut state, AttemptState::BodyReceived, sequence);
                }
                failure = Some(AttemptError::from_dispatch(e, after_first_byte));
                transition(&mut state, AttemptState::Failed, sequence);
            }
            Ok(response) => {
                status = Some(response.status);
                version = Some(response.version.clone());
                transition(&mut state, AttemptState::BodyReceived, sequence);

                let mut body = response.body;
                match self.body_policy {
                    BodyPolicy::Drain => match body.drain().await {
                        Ok(n) => {
                            body_bytes = Some(n);
                            transition(&mut state, AttemptState::Drained, sequence);
                            transition(&mut state, AttemptState::Closed, sequence);
                        }
                        Err(e) => {
                            warn!(
                                "Attempt {}: draining body from {} failed: {}",
                                sequence, target, e
                            );
                            failure = Some(AttemptError::Drain(e));
                        }
                    },
                    BodyPolicy::Abandon => {
                        debug!("Attempt {}: leaving body unread", sequence);
                        drop(body);
                    }
                }
            }
        }

        let events = hooks.seal();
        let tracker = ConnectionLifecycleTracker::from_events(&events);
        tracker.report_contradiction();

        let violations = validate(&events);
        for violation in &violations {
            warn!("Attempt {}: hook ordering: {}", sequence, violation);
        }
        let observer_faults = hooks.observer_faults();
        for fault in &observer_faults {
            error!("Attempt {}: {}", sequence, fault);
        }

        let attempt = Attempt {
            sequence,
            request: request.clone(),
            baseline: clock.baseline(),
            verdict: tracker.verdict(),
            disposal: tracker.disposal(),
            corroborated: tracker.corroborated(),
            events,
            state,
            error: failure,
            status,
            version,
            body_bytes,
            observer_faults,
            violations,
        };
        info!(
            "Attempt {} to {}: {} connection, {}, {} events",
            sequence,
            target,
            attempt.verdict(),
            attempt.state(),
            attempt.events().len()
        );
        attempt
    }

    /// Runs `count` attempts of the same request one after another.
    ///
    /// Each attempt starts only after the previous one is over, so a drained
    /// connection is back in the pool before the next GetConn.
    pub async fn run_sequence(&self, request: &RequestDescriptor, count: usize) -> Vec<Attempt> {
        let mut attempts = Vec::with_capacity(count);
        for _ in 0..count {
            attempts.push(self.run_attempt(request).await);
        }
        attempts
    }

    /// Runs one attempt per request, all in flight at once.
    ///
    /// Results are returned in the order of `requests`.
    pub async fn run_concurrent(&self, requests: &[RequestDescriptor]) -> Vec<Attempt> {
        join_all(requests.iter().map(|request| self.run_attempt(request))).await
    }
}

fn transition(state: &mut AttemptState, next: AttemptState, sequence: usize) {
    let from = *state;
    match state.advance(next) {
        Ok(()) => debug!("Attempt {}: {} -> {}", sequence, from, next),
        Err(e) => error!("Attempt {}: {}", sequence, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error_handling::{TransportError, TransportErrorKind};
    use crate::trace::{ConnectionDescriptor, TraceHooks};
    use crate::tracker::{ConnectionDisposal, ConnectionVerdict};
    use crate::transport::{ResponseBody, TransportResponse};

    const PEER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 80);

    /// Single-slot pool: one idle connection at most.
    #[derive(Default)]
    struct ScriptedTransport {
        idle: Arc<Mutex<bool>>,
        fail_dns: bool,
    }

    struct ScriptedBody {
        idle: Arc<Mutex<bool>>,
        hooks: Arc<dyn TraceHooks>,
        fail: bool,
    }

    #[async_trait]
    impl ResponseBody for ScriptedBody {
        async fn drain(&mut self) -> Result<u64, TransportError> {
            if self.fail {
                return Err(TransportError::new(TransportErrorKind::Body, "connection reset"));
            }
            *self.idle.lock().unwrap() = true;
            self.hooks.put_idle_conn(None);
            Ok(12)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn dispatch(
            &self,
            request: &RequestDescriptor,
            hooks: Arc<dyn TraceHooks>,
        ) -> Result<TransportResponse, TransportError> {
            hooks.get_conn(&request.host_port().unwrap());
            let pooled = std::mem::take(&mut *self.idle.lock().unwrap());
            if pooled {
                hooks.got_conn(ConnectionDescriptor::pooled(
                    Some(PEER),
                    Some(Duration::from_millis(3)),
                ));
            } else {
                hooks.dns_start(&request.host().unwrap());
                if self.fail_dns {
                    hooks.dns_done(&[], Some("no such host"));
                    return Err(TransportError::new(TransportErrorKind::Dns, "no such host"));
                }
                hooks.dns_done(&[PEER.ip()], None);
                hooks.connect_start("tcp", &PEER.to_string());
                hooks.connect_done("tcp", &PEER.to_string(), None);
                hooks.got_conn(ConnectionDescriptor::fresh(Some(PEER)));
            }
            hooks.got_first_response_byte();
            if request.url().path() == "/truncated" {
                return Err(TransportError::new(
                    TransportErrorKind::Other,
                    "connection closed before message completed",
                ));
            }
            Ok(TransportResponse {
                status: 200,
                version: "HTTP/1.1".to_string(),
                remote_addr: Some(PEER),
                body: Box::new(ScriptedBody {
                    idle: Arc::clone(&self.idle),
                    hooks,
                    fail: request.url().path() == "/reset",
                }),
            })
        }
    }

    fn request() -> RequestDescriptor {
        RequestDescriptor::parse("http://example.com/").unwrap()
    }

    #[tokio::test]
    async fn test_drained_connection_is_reused() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()));
        let attempts = runner.run_sequence(&request(), 2).await;

        assert_eq!(attempts[0].verdict(), ConnectionVerdict::New);
        assert_eq!(attempts[0].state(), AttemptState::Closed);
        assert_eq!(attempts[0].disposal(), &ConnectionDisposal::Pooled);
        assert_eq!(attempts[0].body_bytes(), Some(12));

        assert_eq!(attempts[1].verdict(), ConnectionVerdict::Reused);
        assert_eq!(attempts[1].count(EventKind::DnsStart), 0);
        assert_eq!(attempts[1].count(EventKind::ConnectStart), 0);
        assert_eq!(attempts[1].corroborated(), Some(true));
        assert!(attempts[1].ordering_violations().is_empty());
        assert_eq!(attempts[1].sequence(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_body_forces_new_connection() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()))
            .with_body_policy(BodyPolicy::Abandon);
        let attempts = runner.run_sequence(&request(), 2).await;

        for attempt in &attempts {
            assert_eq!(attempt.verdict(), ConnectionVerdict::New);
            assert_eq!(attempt.state(), AttemptState::BodyReceived);
            assert_eq!(attempt.count(EventKind::PutIdleConn), 0);
            assert_eq!(attempt.disposal(), &ConnectionDisposal::NotReturned);
            assert!(attempt.error().is_none());
        }
    }

    #[tokio::test]
    async fn test_dns_failure_ends_attempt() {
        let transport = ScriptedTransport {
            fail_dns: true,
            ..Default::default()
        };
        let runner = RequestAttemptRunner::new(Arc::new(transport));
        let attempt = runner.run_attempt(&request()).await;

        assert_eq!(attempt.state(), AttemptState::Failed);
        assert!(matches!(attempt.error(), Some(AttemptError::Dispatch(_))));
        assert_eq!(attempt.verdict(), ConnectionVerdict::Unknown);
        let kinds: Vec<EventKind> = attempt.events().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::GetConn, EventKind::DnsStart, EventKind::DnsDone]
        );
        assert!(attempt.status().is_none());
    }

    #[tokio::test]
    async fn test_drain_failure_keeps_body_received() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()));
        let request = RequestDescriptor::parse("http://example.com/reset").unwrap();
        let attempt = runner.run_attempt(&request).await;

        assert_eq!(attempt.state(), AttemptState::BodyReceived);
        assert!(matches!(attempt.error(), Some(AttemptError::Drain(_))));
        assert_eq!(attempt.disposal(), &ConnectionDisposal::NotReturned);
        assert_eq!(attempt.status(), Some(200));
    }

    #[tokio::test]
    async fn test_observer_sees_events_live() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()))
            .with_observer(Arc::new(move |_: usize, event: &Event| {
                sink.lock().unwrap().push(event.kind())
            }));
        let attempt = runner.run_attempt(&request()).await;

        let recorded: Vec<EventKind> = attempt.events().iter().map(|e| e.kind()).collect();
        assert_eq!(*seen.lock().unwrap(), recorded);
        assert!(attempt.observer_faults().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_attempt_sequence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()))
            .with_observer(Arc::new(move |sequence: usize, event: &Event| {
                if event.kind() == EventKind::GetConn {
                    sink.lock().unwrap().push(sequence);
                }
            }));
        runner.run_sequence(&request(), 2).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failure_after_first_byte_is_response_error() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()));
        let request = RequestDescriptor::parse("http://example.com/truncated").unwrap();
        let attempt = runner.run_attempt(&request).await;

        assert_eq!(attempt.state(), AttemptState::Failed);
        assert!(matches!(attempt.error(), Some(AttemptError::Response(_))));
        assert_eq!(attempt.count(EventKind::GotFirstResponseByte), 1);
        assert_eq!(attempt.count(EventKind::PutIdleConn), 0);
        assert_eq!(attempt.verdict(), ConnectionVerdict::New);
        assert!(attempt.status().is_none());
    }

    #[tokio::test]
    async fn test_panicking_observer_is_contained() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()))
            .with_observer(Arc::new(|_: usize, event: &Event| {
                if event.kind() == EventKind::GotFirstResponseByte {
                    panic!("observer exploded");
                }
            }));
        let attempt = runner.run_attempt(&request()).await;

        assert_eq!(attempt.state(), AttemptState::Closed);
        assert_eq!(attempt.observer_faults().len(), 1);
        assert_eq!(
            attempt.observer_faults()[0].kind,
            EventKind::GotFirstResponseByte
        );
        assert_eq!(attempt.count(EventKind::PutIdleConn), 1);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_keep_separate_events() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()));
        let requests = vec![
            RequestDescriptor::parse("http://a.example/").unwrap(),
            RequestDescriptor::parse("http://b.example/").unwrap(),
            RequestDescriptor::parse("http://c.example/").unwrap(),
        ];
        let attempts = runner.run_concurrent(&requests).await;

        assert_eq!(attempts.len(), 3);
        let mut sequences: Vec<usize> = attempts.iter().map(|a| a.sequence()).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![1, 2, 3]);
        for (attempt, request) in attempts.iter().zip(&requests) {
            assert_eq!(attempt.count(EventKind::GetConn), 1);
            assert_eq!(attempt.request().host(), request.host());
            assert!(attempt.ordering_violations().is_empty());
        }
    }

    #[tokio::test]
    async fn test_offsets_are_non_decreasing() {
        let runner = RequestAttemptRunner::new(Arc::new(ScriptedTransport::default()));
        let attempt = runner.run_attempt(&request()).await;
        let offsets: Vec<Duration> = attempt.events().iter().map(|e| e.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(attempt.last_offset(), *offsets.last().unwrap());
    }
}

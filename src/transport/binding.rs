//! Per-attempt hook binding carried through the `reqwest` call.
//!
//! `reqwest` resolves names and opens connections deep inside its own futures,
//! with no way to pass per-request state down. The binding travels in a
//! task-local for the duration of the dispatch; the tracing resolver and the
//! tracing connector pick it up when they are first polled and keep their own
//! handle from then on.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::trace::{ConnectionDescriptor, TraceHooks};
use crate::transport::RequestDescriptor;

/// Network name reported on connect events.
pub(crate) const NETWORK_TCP: &str = "tcp";

tokio::task_local! {
    static ACTIVE_BINDING: Arc<AttemptBinding>;
}

#[derive(Debug, Default)]
struct BindingState {
    open_connect: Option<String>,
    connected: bool,
    got_conn: bool,
    dns_failed: bool,
}

/// Hooks of one attempt plus the bookkeeping needed to fire them in order.
pub(crate) struct AttemptBinding {
    hooks: Arc<dyn TraceHooks>,
    host_port: String,
    port: u16,
    ip_literal: bool,
    state: Mutex<BindingState>,
}

impl AttemptBinding {
    pub(crate) fn new(hooks: Arc<dyn TraceHooks>, request: &RequestDescriptor) -> Option<Self> {
        Some(Self {
            hooks,
            host_port: request.host_port()?,
            port: request.port()?,
            ip_literal: request.ip_literal().is_some(),
            state: Mutex::new(BindingState::default()),
        })
    }

    /// The binding of the dispatch currently being polled, if any.
    pub(crate) fn current() -> Option<Arc<Self>> {
        ACTIVE_BINDING.try_with(Arc::clone).ok()
    }

    /// Polls `fut` with this binding installed as the current one.
    pub(crate) async fn scope<F: Future>(self: Arc<Self>, fut: F) -> F::Output {
        ACTIVE_BINDING.scope(self, fut).await
    }

    fn state(&self) -> MutexGuard<'_, BindingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn get_conn(&self) {
        self.hooks.get_conn(&self.host_port);
    }

    pub(crate) fn dns_start(&self, host: &str) {
        self.hooks.dns_start(host);
    }

    /// Reports the resolver outcome. A successful lookup is immediately followed
    /// by a dial to the first address, so ConnectStart fires from here.
    pub(crate) fn dns_done(&self, result: Result<&[IpAddr], &str>) {
        match result {
            Ok(addrs) => {
                self.hooks.dns_done(addrs, None);
                if let Some(ip) = addrs.first() {
                    self.begin_connect(SocketAddr::new(*ip, self.port).to_string());
                }
            }
            Err(error) => {
                self.state().dns_failed = true;
                self.hooks.dns_done(&[], Some(error));
            }
        }
    }

    /// Called when the connector is invoked. IP literal hosts skip the resolver,
    /// so ConnectStart fires here instead.
    pub(crate) fn connector_called(&self) {
        if self.ip_literal {
            self.begin_connect(self.host_port.clone());
        }
    }

    fn begin_connect(&self, addr: String) {
        {
            let mut state = self.state();
            if state.open_connect.is_some() {
                debug!("Ignoring nested connect to {} for {}", addr, self.host_port);
                return;
            }
            state.open_connect = Some(addr.clone());
        }
        self.hooks.connect_start(NETWORK_TCP, &addr);
    }

    /// Called when the connector future resolves. Closes the open ConnectStart,
    /// if any, and on success hands the fresh connection out via GotConn.
    pub(crate) fn connector_finished(&self, error: Option<&str>) {
        let addr = self.state().open_connect.take();
        let Some(addr) = addr else {
            return;
        };
        self.hooks.connect_done(NETWORK_TCP, &addr, error);
        if error.is_none() {
            self.state().connected = true;
            self.fire_got_conn(ConnectionDescriptor::fresh(addr.parse().ok()));
        }
    }

    fn fire_got_conn(&self, info: ConnectionDescriptor) {
        {
            let mut state = self.state();
            if state.got_conn {
                return;
            }
            state.got_conn = true;
        }
        self.hooks.got_conn(info);
    }

    /// Called once the response head is available. If no new connection was
    /// made during this attempt the request went out on a pooled one, and
    /// GotConn is reported now, marked as inferred.
    pub(crate) fn response_received(&self, remote_addr: Option<SocketAddr>) {
        let connected = self.state().connected;
        if !connected {
            self.fire_got_conn(ConnectionDescriptor::pooled(remote_addr, None).mark_inferred());
        }
        self.hooks.got_first_response_byte();
    }

    pub(crate) fn dns_failed(&self) -> bool {
        self.state().dns_failed
    }

    pub(crate) fn hooks(&self) -> Arc<dyn TraceHooks> {
        Arc::clone(&self.hooks)
    }
}

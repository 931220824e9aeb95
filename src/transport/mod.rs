//! Transport boundary.
//!
//! The transport owns everything this crate only observes: name resolution,
//! connection establishment, pooling and the HTTP protocol itself. It is
//! handed the attempt's hooks together with the request and promises to call
//! them at the lifecycle points described in [`crate::trace`].
//!
//! This module provides:
//! - The [`Transport`] and [`ResponseBody`] traits
//! - [`RequestDescriptor`], the reusable request description
//! - [`ReqwestTransport`], a `reqwest`-backed transport that fires the hooks

mod binding;
mod connector;
mod http;
mod request;
mod resolver;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error_handling::TransportError;
use crate::trace::TraceHooks;

pub use connector::TracingConnectLayer;
pub use http::ReqwestTransport;
pub use request::RequestDescriptor;
pub use resolver::TracingResolver;

/// A response body that has not been consumed yet.
///
/// Dropping a body without draining it abandons the connection: it will not
/// go back to the pool and PutIdleConn will not fire.
#[async_trait]
pub trait ResponseBody: Send {
    /// Reads the body to the end and discards it, returning the byte count.
    ///
    /// On success the transport fires PutIdleConn (with an error if the
    /// connection cannot be pooled). On failure it does not.
    async fn drain(&mut self) -> Result<u64, TransportError>;
}

/// A response whose head has been received.
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Protocol version, e.g. `HTTP/1.1`
    pub version: String,
    /// Peer address, when the transport knows it
    pub remote_addr: Option<SocketAddr>,
    /// The unread body
    pub body: Box<dyn ResponseBody>,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

/// Request dispatch with an attached hook binding.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`, calling `hooks` as the request progresses, and resolves
    /// once the response head is available.
    ///
    /// After an error no further hooks are fired for this call.
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        hooks: Arc<dyn TraceHooks>,
    ) -> Result<TransportResponse, TransportError>;
}

//! Tracing connector layer for reqwest.
//!
//! Wraps reqwest's connector service. The wrapped service only runs when the
//! pool has no idle connection to offer, so every call here is a new
//! connection: ConnectStart is opened (directly for IP literal hosts, by the
//! resolver otherwise) and ConnectDone closes it when the dial finishes.
//! For https targets the dial includes the TLS handshake.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::transport::binding::AttemptBinding;

/// `tower::Layer` that installs [`TracingConnect`] around reqwest's connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConnectLayer;

impl<S> Layer<S> for TracingConnectLayer {
    type Service = TracingConnect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingConnect { inner }
    }
}

/// Connector service reporting connect events to the active attempt.
#[derive(Debug, Clone)]
pub struct TracingConnect<S> {
    inner: S,
}

impl<S, R> Service<R> for TracingConnect<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        // The dial may be moved to a background task if the pool wins the race,
        // so keep the binding instead of looking it up again on completion.
        let binding = AttemptBinding::current();
        if let Some(binding) = &binding {
            binding.connector_called();
        }
        let dial = self.inner.call(req);
        Box::pin(async move {
            let result = dial.await;
            if let Some(binding) = &binding {
                match &result {
                    Ok(_) => binding.connector_finished(None),
                    Err(e) => binding.connector_finished(Some(e.to_string().as_str())),
                }
            }
            result
        })
    }
}

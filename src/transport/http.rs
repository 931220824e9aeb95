//! `reqwest`-backed transport.
//!
//! Hooks are fired from three places:
//! - this module: GetConn before the request is handed to reqwest,
//!   GotConn (pooled case) and GotFirstResponseByte once the response head
//!   arrives, PutIdleConn after the body has been read to the end
//! - [`TracingResolver`](super::TracingResolver): DNSStart, DNSDone
//! - [`TracingConnectLayer`](super::TracingConnectLayer): ConnectStart,
//!   ConnectDone and GotConn for new connections
//!
//! The client must be built with both the resolver and the connector layer
//! installed (see [`crate::initialization::init_client`]) or the DNS and
//! connect events are simply missing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use reqwest::{Method, StatusCode, Version};

use crate::config::{Config, POOL_SETTLE_DELAY};
use crate::error_handling::{
    transport_error_from_reqwest, InitializationError, TransportError, TransportErrorKind,
};
use crate::initialization::init_client;
use crate::trace::TraceHooks;
use crate::transport::binding::AttemptBinding;
use crate::transport::{RequestDescriptor, ResponseBody, Transport, TransportResponse};

/// Transport backed by a shared `reqwest::Client` and its connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Arc<reqwest::Client>,
    settle_delay: Duration,
}

impl ReqwestTransport {
    /// Wraps an already configured client.
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        Self {
            client,
            settle_delay: POOL_SETTLE_DELAY,
        }
    }

    /// Builds a traced client from `config` and wraps it.
    pub fn from_config(config: &Config) -> Result<Self, InitializationError> {
        Ok(Self::new(init_client(config)?))
    }

    /// How long a drained body waits for the pool to take the connection back.
    ///
    /// hyper returns connections to the pool from a background task once the
    /// body is finished; without a short pause a back-to-back attempt can race
    /// it and dial a new connection.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    fn classify(binding: &AttemptBinding, error: &reqwest::Error) -> TransportError {
        let mut classified = transport_error_from_reqwest(error);
        if binding.dns_failed() {
            classified.kind = TransportErrorKind::Dns;
        }
        classified
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        hooks: Arc<dyn TraceHooks>,
    ) -> Result<TransportResponse, TransportError> {
        let binding = AttemptBinding::new(hooks, request).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Request,
                format!("URL has no host or port: {}", request.url()),
            )
        })?;
        let binding = Arc::new(binding);

        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .build()
            .map_err(|e| transport_error_from_reqwest(&e))?;

        binding.get_conn();
        let sent = Arc::clone(&binding)
            .scope(self.client.execute(http_request))
            .await;

        match sent {
            Ok(response) => {
                let remote_addr = response.remote_addr();
                binding.response_received(remote_addr);
                let reuse_blocker = reuse_blocker(
                    request,
                    response.version(),
                    response.status(),
                    response.headers(),
                );
                debug!(
                    "{} {} -> {} ({:?})",
                    request.method(),
                    request.url(),
                    response.status(),
                    response.version()
                );
                Ok(TransportResponse {
                    status: response.status().as_u16(),
                    version: format!("{:?}", response.version()),
                    remote_addr,
                    body: Box::new(ReqwestBody {
                        response: Some(response),
                        hooks: binding.hooks(),
                        reuse_blocker,
                        settle_delay: self.settle_delay,
                    }),
                })
            }
            Err(e) => Err(Self::classify(&binding, &e)),
        }
    }
}

/// Why the connection will not go back to the pool, if it won't.
fn reuse_blocker(
    request: &RequestDescriptor,
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
) -> Option<String> {
    if has_token(headers, CONNECTION.as_str(), "close") {
        return Some("server sent Connection: close".to_string());
    }
    let request_close = request.headers().iter().any(|(name, value)| {
        name.eq_ignore_ascii_case(CONNECTION.as_str()) && token_list_contains(value, "close")
    });
    if request_close {
        return Some("request sent Connection: close".to_string());
    }

    let legacy = version == Version::HTTP_09 || version == Version::HTTP_10;
    if legacy && !has_token(headers, CONNECTION.as_str(), "keep-alive") {
        return Some(format!("{:?} response without keep-alive", version));
    }
    let http1 = legacy || version == Version::HTTP_11;
    let delimited = headers.contains_key(CONTENT_LENGTH)
        || has_token(headers, TRANSFER_ENCODING.as_str(), "chunked");
    if http1 && !delimited && has_body(request.method(), status) {
        return Some("response body delimited by connection close".to_string());
    }
    None
}

/// Responses that never carry a body can be reused without framing headers.
fn has_body(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

fn has_token(headers: &HeaderMap, name: &str, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| token_list_contains(v, token))
}

fn token_list_contains(value: &str, token: &str) -> bool {
    value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}

struct ReqwestBody {
    response: Option<reqwest::Response>,
    hooks: Arc<dyn TraceHooks>,
    reuse_blocker: Option<String>,
    settle_delay: Duration,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn drain(&mut self) -> Result<u64, TransportError> {
        let Some(mut response) = self.response.take() else {
            return Err(TransportError::new(
                TransportErrorKind::Body,
                "body was already drained",
            ));
        };

        let mut total: u64 = 0;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => total += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    let mut error = transport_error_from_reqwest(&e);
                    error.kind = TransportErrorKind::Body;
                    return Err(error);
                }
            }
        }
        drop(response);

        self.hooks.put_idle_conn(self.reuse_blocker.as_deref());
        if self.reuse_blocker.is_none() && !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        Ok(total)
    }
}

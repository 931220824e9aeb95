//! HTTP client initialization.
//!
//! This module builds the `reqwest::Client` used by
//! [`ReqwestTransport`](crate::transport::ReqwestTransport), with the tracing
//! resolver and connector layer installed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::Config;
use crate::error_handling::InitializationError;
use crate::transport::{TracingConnectLayer, TracingResolver};

/// Initializes the traced HTTP client.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from the config
/// - Request and connect timeouts from the config
/// - Redirects disabled, so one attempt is exactly one request on one connection
/// - Proxies disabled, so connect events name the target rather than a proxy
/// - [`TracingResolver`] for DNS events
/// - [`TracingConnectLayer`] for connect events
///
/// # Arguments
///
/// * `config` - Run configuration containing user-agent and timeout settings
///
/// # Returns
///
/// A configured HTTP client ready for making traced requests.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation fails.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .dns_resolver(Arc::new(TracingResolver))
        .connector_layer(TracingConnectLayer)
        .build()?;
    Ok(Arc::new(client))
}

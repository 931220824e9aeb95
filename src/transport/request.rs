//! Request descriptors.
//!
//! A descriptor names what to send (method, URL, extra headers). It is never
//! mutated by an attempt, so the same descriptor can drive any number of
//! sequential or concurrent attempts.

use std::net::IpAddr;
use std::str::FromStr;

use reqwest::Method;
use url::{Host, Url};

use crate::error_handling::ConfigError;

/// An outbound request, reusable across attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
        }
    }

    /// A `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses `url` and builds a `GET` request, accepting only http and https.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if parsed.host().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self::get(parsed))
    }

    /// Adds an extra request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Host as used for name resolution (no brackets around IPv6 literals).
    pub fn host(&self) -> Option<String> {
        match self.url.host()? {
            Host::Domain(d) => Some(d.to_string()),
            Host::Ipv4(ip) => Some(ip.to_string()),
            Host::Ipv6(ip) => Some(ip.to_string()),
        }
    }

    /// Port, falling back to the scheme's default.
    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    /// `host:port` as reported by GetConn, with IPv6 literals bracketed.
    pub fn host_port(&self) -> Option<String> {
        let port = self.port()?;
        match self.url.host()? {
            Host::Domain(d) => Some(format!("{}:{}", d, port)),
            Host::Ipv4(ip) => Some(format!("{}:{}", ip, port)),
            Host::Ipv6(ip) => Some(format!("[{}]:{}", ip, port)),
        }
    }

    /// The host as an IP address, when the URL names one directly. Such
    /// requests never need name resolution.
    pub fn ip_literal(&self) -> Option<IpAddr> {
        match self.url.host()? {
            Host::Domain(_) => None,
            Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
            Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        }
    }
}

impl FromStr for RequestDescriptor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

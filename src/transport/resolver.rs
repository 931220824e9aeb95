//! Tracing DNS resolver for reqwest.
//!
//! Implements `reqwest::dns::Resolve` by delegating to the system resolver and
//! reporting DNSStart/DNSDone to the attempt whose dispatch triggered the
//! lookup. Lookups outside any traced dispatch resolve normally and report
//! nothing.

use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::transport::binding::AttemptBinding;

/// A DNS resolver that reports lookups to the active attempt's hooks.
///
/// Wraps `tokio::net::lookup_host` (system resolver). Results are passed to
/// reqwest unchanged; reqwest fills in the port itself.
#[derive(Debug, Clone, Default)]
pub struct TracingResolver;

impl Resolve for TracingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        // Captured at call time: the lookup future may outlive the task-local scope.
        let binding = AttemptBinding::current();
        Box::pin(async move {
            let host = name.as_str().to_string();
            if let Some(binding) = &binding {
                binding.dns_start(&host);
            }

            let lookup = tokio::net::lookup_host(format!("{}:0", host)).await;
            match lookup {
                Ok(addrs) => {
                    let addrs: Vec<SocketAddr> = addrs.collect();
                    if let Some(binding) = &binding {
                        let ips: Vec<IpAddr> = addrs.iter().map(SocketAddr::ip).collect();
                        binding.dns_done(Ok(ips.as_slice()));
                    }
                    let addrs: Addrs = Box::new(addrs.into_iter());
                    Ok(addrs)
                }
                Err(e) => {
                    if let Some(binding) = &binding {
                        binding.dns_done(Err(e.to_string().as_str()));
                    }
                    Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
                }
            }
        })
    }
}

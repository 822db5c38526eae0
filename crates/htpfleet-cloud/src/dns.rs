//! DNS record management and propagation checks

use crate::error::{CloudError, Result};
use crate::wait::{PollConfig, poll_until};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Registrar abstraction for A-record updates
#[async_trait]
pub trait DnsRegistrar: Send + Sync {
    fn name(&self) -> &str;

    /// Create or overwrite `host.zone IN A ip`
    async fn upsert_a_record(&self, zone: &str, host: &str, ip: Ipv4Addr, ttl: u32)
    -> Result<DnsUpdate>;
}

/// Outcome of an A-record upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsUpdate {
    Updated,
    /// The registrar refused API access for this account; the operator has
    /// to create the record by hand. Provisioning carries on regardless.
    ManualActionRequired {
        record: String,
        ip: Ipv4Addr,
        reason: String,
    },
}

/// Forward resolver used to observe propagation
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_ipv4(&self, name: &str) -> std::io::Result<Vec<Ipv4Addr>>;
}

/// Resolver backed by the operating system's stub resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_ipv4(&self, name: &str) -> std::io::Result<Vec<Ipv4Addr>> {
        let addrs = tokio::net::lookup_host((name, 0)).await?;
        Ok(addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .collect())
    }
}

/// Split a fully qualified name into (zone, host)
///
/// The zone is the registrable domain (last two labels); an apex name maps
/// to host `@`.
pub fn split_domain(fqdn: &str) -> Result<(String, String)> {
    let fqdn = fqdn.trim_end_matches('.');
    let labels: Vec<&str> = fqdn.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(CloudError::InvalidConfig(format!(
            "'{}' is not a fully qualified domain name",
            fqdn
        )));
    }

    let zone = labels[labels.len() - 2..].join(".");
    let host = if labels.len() == 2 {
        "@".to_string()
    } else {
        labels[..labels.len() - 2].join(".")
    };
    Ok((zone, host))
}

/// Poll DNS until `domain` resolves to `expected`
///
/// Resolution failures, NXDOMAIN included, are treated as "not yet". Returns
/// `false` once `timeout` has elapsed without a match; the caller decides
/// whether that is fatal.
pub async fn wait_for_propagation<P>(
    resolver: &dyn Resolver,
    domain: &str,
    expected: Ipv4Addr,
    timeout: Duration,
    interval: Duration,
    on_tick: P,
) -> bool
where
    P: FnMut(Duration),
{
    let config = PollConfig::new(interval, timeout);
    let outcome = poll_until(
        &config,
        "DNS propagation",
        move || async move {
            match resolver.resolve_ipv4(domain).await {
                Ok(addrs) => {
                    tracing::debug!("{} resolves to {:?}", domain, addrs);
                    Ok(addrs.contains(&expected).then_some(()))
                }
                Err(e) => {
                    tracing::debug!("{} does not resolve yet: {}", domain, e);
                    Ok(None)
                }
            }
        },
        on_tick,
    )
    .await;

    outcome.is_ok()
}

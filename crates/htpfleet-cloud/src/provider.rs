//! Compute provider trait definition

use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

pub type InstanceId = u64;
pub type FirewallId = u64;
pub type NetworkId = u64;

/// Compute provider abstraction
///
/// Covers instance lifecycle, the private network and firewalls. Creation
/// calls are not idempotent: calling them twice creates two resources.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Returns the provider name (e.g., "linode")
    fn name(&self) -> &str;

    async fn list_regions(&self) -> Result<Vec<Region>>;

    async fn list_instance_types(&self) -> Result<Vec<InstanceType>>;

    /// Create an instance without booting it
    async fn create_instance(&self, request: &CreateInstance) -> Result<Instance>;

    async fn boot_instance(&self, id: InstanceId) -> Result<()>;

    /// Reboot and block until the provider reports the reboot finished
    ///
    /// The reboot request is retried on transient errors according to
    /// `retry`.
    async fn reboot_and_wait(&self, id: InstanceId, retry: &RetryPolicy) -> Result<()>;

    async fn list_instances(&self) -> Result<Vec<Instance>>;

    async fn delete_instance(&self, id: InstanceId) -> Result<()>;

    /// Create the private network with a single subnet
    async fn create_network(&self, spec: &NetworkSpec) -> Result<Network>;

    async fn list_networks(&self) -> Result<Vec<Network>>;

    async fn delete_network(&self, id: NetworkId) -> Result<()>;

    /// Bind an unbooted instance to `private_ip` inside the named subnet
    ///
    /// Must run before the instance's first boot so its bootstrap script
    /// sees the private interface.
    async fn attach_to_private_network(
        &self,
        id: InstanceId,
        network_label: &str,
        subnet_label: &str,
        private_ip: Ipv4Addr,
    ) -> Result<()>;

    async fn list_firewalls(&self) -> Result<Vec<Firewall>>;

    /// Create a firewall that drops all inbound and accepts all outbound traffic
    async fn create_firewall(&self, label: &str) -> Result<Firewall>;

    /// Replace the whole inbound rule set; outbound stays fully open
    async fn replace_inbound_rules(&self, id: FirewallId, rules: &[InboundRule]) -> Result<()>;

    async fn delete_firewall(&self, id: FirewallId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub label: String,
    pub region: String,
    pub instance_type: String,
    pub status: String,
    pub ipv4: Vec<Ipv4Addr>,
}

impl Instance {
    /// First assigned IPv4 address (the public one on creation)
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4.first().copied()
    }
}

/// Parameters for a new, unbooted instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstance {
    pub instance_type: String,
    pub region: String,
    pub image: String,
    pub label: String,
    pub firewall_id: FirewallId,
    /// Provider-side bootstrap script run on first boot
    pub bootstrap_script_id: u64,
    pub bootstrap_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub label: String,
    pub region: String,
    pub subnet_label: String,
    pub subnet_cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub label: String,
    pub region: String,
    pub subnets: Vec<Subnet>,
}

impl Network {
    pub fn subnet(&self, label: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: u64,
    pub label: String,
    pub ipv4: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: FirewallId,
    pub label: String,
}

/// Inbound TCP accept rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRule {
    pub label: String,
    pub ports: Vec<u16>,
    /// Allowed IPv4 sources in CIDR notation
    pub sources: Vec<String>,
}

impl InboundRule {
    pub fn new(
        label: impl Into<String>,
        ports: impl IntoIterator<Item = u16>,
        sources: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            label: label.into(),
            ports: ports.into_iter().collect(),
            sources: sources.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for InboundRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ports: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{} ACCEPT TCP [{}] {}",
            self.label,
            ports.join(", "),
            self.sources.join(", ")
        )
    }
}

/// Return the id of the firewall labelled `label`, creating it if missing
///
/// This is the only idempotent creation step: reruns reuse the firewall
/// instead of creating a duplicate.
pub async fn ensure_firewall(provider: &dyn ComputeProvider, label: &str) -> Result<FirewallId> {
    let existing = provider
        .list_firewalls()
        .await?
        .into_iter()
        .find(|f| f.label == label);

    if let Some(firewall) = existing {
        tracing::debug!("Firewall {} already exists (id {})", label, firewall.id);
        return Ok(firewall.id);
    }

    tracing::info!("Creating firewall {}", label);
    Ok(provider.create_firewall(label).await?.id)
}

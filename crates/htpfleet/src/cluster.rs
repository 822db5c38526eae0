//! Cluster naming, private addressing and resource ownership
//!
//! The label prefix is the only link between the settings file and the
//! resources in the cloud account: everything this tool creates is named
//! from it, and teardown selects by it.

use crate::error::{Result, WorkflowError};
use htpfleet_cloud::{ComputeProvider, Firewall, Instance, Network};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// Upper bound for agents per deployment
pub const MAX_AGENTS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNames {
    prefix: String,
}

impl ClusterNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn server(&self) -> String {
        format!("{}server", self.prefix)
    }

    /// Agent label, `index` starting at 1
    pub fn agent(&self, index: usize) -> String {
        format!("{}agent_{:02}", self.prefix, index)
    }

    pub fn agent_prefix(&self) -> String {
        format!("{}agent_", self.prefix)
    }

    pub fn server_firewall(&self) -> String {
        format!("{}server_firewall", self.prefix)
    }

    pub fn agent_firewall(&self) -> String {
        format!("{}agent_firewall", self.prefix)
    }

    /// VPC labels only allow dashes
    pub fn network_prefix(&self) -> String {
        self.prefix.replace('_', "-")
    }

    pub fn vpc(&self) -> String {
        format!("{}vpc", self.network_prefix())
    }

    pub fn subnet(&self) -> String {
        format!("{}vpc-subnet", self.network_prefix())
    }
}

/// Private addresses for one deployment
///
/// The provider keeps the first host address of the subnet for itself; the
/// server gets the next one and agent *i* the *i*-th after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    subnet: Ipv4Network,
    server: Ipv4Addr,
    agents: Vec<Ipv4Addr>,
}

impl AddressPlan {
    pub fn new(cidr: &str, agent_count: usize) -> Result<Self> {
        let subnet: Ipv4Network = cidr
            .parse()
            .map_err(|e| WorkflowError::AddressPlan(format!("'{}': {}", cidr, e)))?;

        let broadcast = subnet.broadcast();
        let usable: Vec<Ipv4Addr> = subnet
            .iter()
            .skip(2)
            .take_while(|ip| *ip != broadcast)
            .take(agent_count + 1)
            .collect();

        if usable.len() < agent_count + 1 {
            return Err(WorkflowError::AddressPlan(format!(
                "{} has room for {} hosts, {} needed",
                cidr,
                usable.len(),
                agent_count + 1
            )));
        }

        Ok(Self {
            subnet,
            server: usable[0],
            agents: usable[1..].to_vec(),
        })
    }

    pub fn subnet(&self) -> String {
        self.subnet.to_string()
    }

    pub fn server(&self) -> Ipv4Addr {
        self.server
    }

    /// Address of agent `index` (1-based)
    pub fn agent(&self, index: usize) -> Option<Ipv4Addr> {
        index
            .checked_sub(1)
            .and_then(|i| self.agents.get(i))
            .copied()
    }

    #[cfg(test)]
    pub fn agents(&self) -> &[Ipv4Addr] {
        &self.agents
    }
}

/// Which resources a teardown covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Instances, firewalls and the VPC
    Cluster,
    /// Agent instances only
    AgentsOnly,
}

/// Account resources that belong to this cluster
#[derive(Debug, Default)]
pub struct OwnedResources {
    pub instances: Vec<Instance>,
    pub firewalls: Vec<Firewall>,
    pub networks: Vec<Network>,
}

impl OwnedResources {
    pub async fn collect(
        provider: &dyn ComputeProvider,
        names: &ClusterNames,
        scope: Scope,
    ) -> Result<Self> {
        let instance_prefix = match scope {
            Scope::Cluster => names.prefix().to_string(),
            Scope::AgentsOnly => names.agent_prefix(),
        };

        let instances = provider
            .list_instances()
            .await?
            .into_iter()
            .filter(|i| i.label.starts_with(&instance_prefix))
            .collect();

        if scope == Scope::AgentsOnly {
            return Ok(Self {
                instances,
                ..Self::default()
            });
        }

        let firewalls = provider
            .list_firewalls()
            .await?
            .into_iter()
            .filter(|f| f.label.starts_with(names.prefix()))
            .collect();

        let network_prefix = names.network_prefix();
        let networks = provider
            .list_networks()
            .await?
            .into_iter()
            .filter(|n| n.label.starts_with(&network_prefix))
            .collect();

        Ok(Self {
            instances,
            firewalls,
            networks,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.firewalls.is_empty() && self.networks.is_empty()
    }

    /// Labels in deletion order
    pub fn labels(&self) -> Vec<&str> {
        self.instances
            .iter()
            .map(|i| i.label.as_str())
            .chain(self.firewalls.iter().map(|f| f.label.as_str()))
            .chain(self.networks.iter().map(|n| n.label.as_str()))
            .collect()
    }
}

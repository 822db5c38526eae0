//! Linode API v4 wire types

use htpfleet_cloud::{Firewall, InboundRule, Instance, InstanceType, Network, Region, Subnet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorItem {
    pub reason: String,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRegion {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl From<ApiRegion> for Region {
    fn from(r: ApiRegion) -> Self {
        Region {
            id: r.id,
            label: r.label,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiType {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl From<ApiType> for InstanceType {
    fn from(t: ApiType) -> Self {
        InstanceType {
            id: t.id,
            label: t.label,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiInstance {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub region: String,
    #[serde(rename = "type", default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ipv4: Vec<Ipv4Addr>,
}

impl From<ApiInstance> for Instance {
    fn from(i: ApiInstance) -> Self {
        Instance {
            id: i.id,
            label: i.label,
            region: i.region,
            instance_type: i.instance_type.unwrap_or_default(),
            status: i.status,
            ipv4: i.ipv4,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateInstanceBody<'a> {
    #[serde(rename = "type")]
    pub instance_type: &'a str,
    pub region: &'a str,
    pub image: &'a str,
    pub label: &'a str,
    pub root_pass: String,
    pub firewall_id: u64,
    pub booted: bool,
    pub stackscript_id: u64,
    pub stackscript_data: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFirewall {
    pub id: u64,
    pub label: String,
}

impl From<ApiFirewall> for Firewall {
    fn from(f: ApiFirewall) -> Self {
        Firewall {
            id: f.id,
            label: f.label,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateFirewallBody<'a> {
    pub label: &'a str,
    pub rules: FirewallRules,
}

/// Full rule set as accepted by `PUT /networking/firewalls/{id}/rules`
#[derive(Debug, Serialize)]
pub struct FirewallRules {
    pub inbound: Vec<ApiRule>,
    pub outbound: Vec<ApiRule>,
    pub inbound_policy: &'static str,
    pub outbound_policy: &'static str,
}

impl FirewallRules {
    /// Drop everything inbound except `inbound`, accept everything outbound
    pub fn inbound_only(inbound: Vec<ApiRule>) -> Self {
        Self {
            inbound,
            outbound: Vec::new(),
            inbound_policy: "DROP",
            outbound_policy: "ACCEPT",
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ApiRule {
    pub label: String,
    pub action: &'static str,
    pub protocol: &'static str,
    /// Comma separated, e.g. `"80, 443"`
    pub ports: String,
    pub addresses: RuleAddresses,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RuleAddresses {
    pub ipv4: Vec<String>,
}

impl From<&InboundRule> for ApiRule {
    fn from(rule: &InboundRule) -> Self {
        let ports: Vec<String> = rule.ports.iter().map(|p| p.to_string()).collect();
        ApiRule {
            label: rule.label.clone(),
            action: "ACCEPT",
            protocol: "TCP",
            ports: ports.join(", "),
            addresses: RuleAddresses {
                ipv4: rule.sources.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiVpc {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub subnets: Vec<ApiSubnet>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubnet {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub ipv4: Option<String>,
}

impl From<ApiVpc> for Network {
    fn from(v: ApiVpc) -> Self {
        Network {
            id: v.id,
            label: v.label,
            region: v.region,
            subnets: v
                .subnets
                .into_iter()
                .map(|s| Subnet {
                    id: s.id,
                    label: s.label,
                    ipv4: s.ipv4.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateVpcBody<'a> {
    pub label: &'a str,
    pub region: &'a str,
    pub subnets: Vec<CreateSubnetBody<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CreateSubnetBody<'a> {
    pub label: &'a str,
    pub ipv4: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfigProfile {
    pub id: u64,
}

/// Body of `POST /linode/instances/{id}/configs/{cid}/interfaces`
#[derive(Debug, Serialize)]
pub struct VpcInterfaceBody {
    pub purpose: &'static str,
    pub primary: bool,
    pub active: bool,
    pub ipam_address: Option<String>,
    pub vpc_id: u64,
    pub subnet_id: u64,
    pub ipv4: VpcInterfaceIpv4,
    pub ip_ranges: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VpcInterfaceIpv4 {
    /// Public address the private one is 1:1 NATed to
    pub nat_1_1: Ipv4Addr,
    pub vpc: Ipv4Addr,
}

impl VpcInterfaceBody {
    pub fn new(vpc_id: u64, subnet_id: u64, public_ip: Ipv4Addr, private_ip: Ipv4Addr) -> Self {
        Self {
            purpose: "vpc",
            primary: true,
            active: true,
            ipam_address: None,
            vpc_id,
            subnet_id,
            ipv4: VpcInterfaceIpv4 {
                nat_1_1: public_ip,
                vpc: private_ip,
            },
            ip_ranges: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiEvent {
    pub id: u64,
    pub action: String,
    #[serde(default)]
    pub status: String,
}

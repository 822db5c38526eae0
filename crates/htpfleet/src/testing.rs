//! In-memory gateways for workflow tests

use crate::backend::Backend;
use crate::console::{self, Prompt};
use crate::error::Result;
use crate::net::WebProbe;
use async_trait::async_trait;
use htpfleet_cloud::{
    Agent, AgentListing, CloudError, ComputeProvider, Coordinator, CreateInstance, DnsRegistrar,
    DnsUpdate, Firewall, FirewallId, InboundRule, Instance, InstanceId, InstanceType, Network,
    NetworkId, NetworkSpec, Region, Resolver, RetryPolicy, Subnet,
};
use htpfleet_config::{ClusterSettings, Config, Keys, StackScripts};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

pub const VALID_ACCESS_KEY: &str = "s3cr3tKey";
pub const DEPLOYER_IP: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 23);

pub fn test_config() -> Config {
    Config {
        keys: Keys {
            linode: "linode-token".to_string(),
            godaddy_key: "gd-key".to_string(),
            godaddy_secret: "gd-secret".to_string(),
            hashtopolis: VALID_ACCESS_KEY.to_string(),
        },
        stackscripts: StackScripts {
            server: 111,
            agent: 222,
        },
        settings: ClusterSettings {
            cluster_prefix: "htp_cluster_".to_string(),
            domain: "cluster.example.com".to_string(),
            autoclean_when_failed: false,
        },
        provisioning: Default::default(),
        timing: Default::default(),
    }
}

/// Answers questions from a fixed script and records what was asked
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn ask(&mut self, question: &str) -> console::Result<String> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(console::ConsoleError::Closed)
    }
}

#[derive(Default)]
pub struct CloudState {
    next_id: u64,
    pub instances: Vec<Instance>,
    pub created: Vec<CreateInstance>,
    pub firewalls: Vec<Firewall>,
    pub firewall_creations: usize,
    /// Every rule set written, per firewall
    pub rule_history: HashMap<FirewallId, Vec<Vec<InboundRule>>>,
    pub networks: Vec<Network>,
    pub attachments: Vec<(InstanceId, Ipv4Addr)>,
    pub booted: Vec<InstanceId>,
    pub reboots: Vec<InstanceId>,
    /// Labels in deletion order
    pub deleted: Vec<String>,
}

impl CloudState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn current_rules(&self, id: FirewallId) -> Vec<InboundRule> {
        self.rule_history
            .get(&id)
            .and_then(|h| h.last().cloned())
            .unwrap_or_default()
    }

    pub fn firewall_id(&self, label: &str) -> Option<FirewallId> {
        self.firewalls.iter().find(|f| f.label == label).map(|f| f.id)
    }
}

#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn with_network(self, label: &str, subnet_label: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.allocate_id();
            state.networks.push(Network {
                id,
                label: label.to_string(),
                region: "eu-central".to_string(),
                subnets: vec![Subnet {
                    id: id + 1000,
                    label: subnet_label.to_string(),
                    ipv4: "10.0.77.0/24".to_string(),
                }],
            });
        }
        self
    }

    pub fn with_instance(self, label: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.allocate_id();
            state.instances.push(Instance {
                id,
                label: label.to_string(),
                region: "eu-central".to_string(),
                instance_type: "g6-standard-2".to_string(),
                status: "running".to_string(),
                ipv4: vec![Ipv4Addr::new(203, 0, 113, id as u8)],
            });
        }
        self
    }

    pub fn with_firewall(self, label: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.allocate_id();
            state.firewalls.push(Firewall {
                id,
                label: label.to_string(),
            });
        }
        self
    }
}

#[async_trait]
impl ComputeProvider for FakeCloud {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_regions(&self) -> htpfleet_cloud::Result<Vec<Region>> {
        Ok(vec![
            Region {
                id: "eu-central".to_string(),
                label: "Frankfurt, DE".to_string(),
            },
            Region {
                id: "us-east".to_string(),
                label: "Newark, NJ".to_string(),
            },
        ])
    }

    async fn list_instance_types(&self) -> htpfleet_cloud::Result<Vec<InstanceType>> {
        Ok(vec![
            InstanceType {
                id: "g6-standard-2".to_string(),
                label: "Linode 4GB".to_string(),
            },
            InstanceType {
                id: "g1-gpu-rtx6000-1".to_string(),
                label: "Dedicated 32GB + RTX6000 GPU x1".to_string(),
            },
        ])
    }

    async fn create_instance(&self, request: &CreateInstance) -> htpfleet_cloud::Result<Instance> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let instance = Instance {
            id,
            label: request.label.clone(),
            region: request.region.clone(),
            instance_type: request.instance_type.clone(),
            status: "offline".to_string(),
            ipv4: vec![Ipv4Addr::new(203, 0, 113, id as u8)],
        };
        state.instances.push(instance.clone());
        state.created.push(request.clone());
        Ok(instance)
    }

    async fn boot_instance(&self, id: InstanceId) -> htpfleet_cloud::Result<()> {
        self.state.lock().unwrap().booted.push(id);
        Ok(())
    }

    async fn reboot_and_wait(&self, id: InstanceId, _retry: &RetryPolicy) -> htpfleet_cloud::Result<()> {
        self.state.lock().unwrap().reboots.push(id);
        Ok(())
    }

    async fn list_instances(&self) -> htpfleet_cloud::Result<Vec<Instance>> {
        Ok(self.state.lock().unwrap().instances.clone())
    }

    async fn delete_instance(&self, id: InstanceId) -> htpfleet_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .instances
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("instance {}", id)))?;
        let removed = state.instances.remove(index);
        state.deleted.push(removed.label);
        Ok(())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> htpfleet_cloud::Result<Network> {
        let mut state = self.state.lock().unwrap();
        if state.networks.iter().any(|n| n.label == spec.label) {
            return Err(CloudError::Api {
                status: 400,
                message: "label: Label must be unique among your VPCs".to_string(),
            });
        }
        let id = state.allocate_id();
        let network = Network {
            id,
            label: spec.label.clone(),
            region: spec.region.clone(),
            subnets: vec![Subnet {
                id: id + 1000,
                label: spec.subnet_label.clone(),
                ipv4: spec.subnet_cidr.clone(),
            }],
        };
        state.networks.push(network.clone());
        Ok(network)
    }

    async fn list_networks(&self) -> htpfleet_cloud::Result<Vec<Network>> {
        Ok(self.state.lock().unwrap().networks.clone())
    }

    async fn delete_network(&self, id: NetworkId) -> htpfleet_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .networks
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("VPC {}", id)))?;
        let removed = state.networks.remove(index);
        state.deleted.push(removed.label);
        Ok(())
    }

    async fn attach_to_private_network(
        &self,
        id: InstanceId,
        network_label: &str,
        subnet_label: &str,
        private_ip: Ipv4Addr,
    ) -> htpfleet_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.booted.contains(&id) {
            return Err(CloudError::Rejected(format!(
                "instance {} must not be booted before VPC attachment",
                id
            )));
        }
        let known = state
            .networks
            .iter()
            .find(|n| n.label == network_label)
            .and_then(|n| n.subnet(subnet_label))
            .is_some();
        if !known {
            return Err(CloudError::ResourceNotFound(format!(
                "VPC {} / {}",
                network_label, subnet_label
            )));
        }
        state.attachments.push((id, private_ip));
        Ok(())
    }

    async fn list_firewalls(&self) -> htpfleet_cloud::Result<Vec<Firewall>> {
        Ok(self.state.lock().unwrap().firewalls.clone())
    }

    async fn create_firewall(&self, label: &str) -> htpfleet_cloud::Result<Firewall> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let firewall = Firewall {
            id,
            label: label.to_string(),
        };
        state.firewalls.push(firewall.clone());
        state.firewall_creations += 1;
        Ok(firewall)
    }

    async fn replace_inbound_rules(&self, id: FirewallId, rules: &[InboundRule]) -> htpfleet_cloud::Result<()> {
        self.state
            .lock()
            .unwrap()
            .rule_history
            .entry(id)
            .or_default()
            .push(rules.to_vec());
        Ok(())
    }

    async fn delete_firewall(&self, id: FirewallId) -> htpfleet_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .firewalls
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("firewall {}", id)))?;
        let removed = state.firewalls.remove(index);
        state.deleted.push(removed.label);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRegistrar {
    pub manual_only: bool,
    pub records: Mutex<Vec<(String, String, Ipv4Addr, u32)>>,
}

#[async_trait]
impl DnsRegistrar for FakeRegistrar {
    fn name(&self) -> &str {
        "fake"
    }

    async fn upsert_a_record(
        &self,
        zone: &str,
        host: &str,
        ip: Ipv4Addr,
        ttl: u32,
    ) -> htpfleet_cloud::Result<DnsUpdate> {
        if self.manual_only {
            return Ok(DnsUpdate::ManualActionRequired {
                record: format!("{}.{}", host, zone),
                ip,
                reason: "account below API tier".to_string(),
            });
        }
        self.records
            .lock()
            .unwrap()
            .push((zone.to_string(), host.to_string(), ip, ttl));
        Ok(DnsUpdate::Updated)
    }
}

/// Resolves every name to whatever the cloud assigned to the server, or
/// never resolves when `stale` is set
pub struct FakeResolver {
    cloud: Arc<FakeCloud>,
    pub stale: bool,
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve_ipv4(&self, _name: &str) -> std::io::Result<Vec<Ipv4Addr>> {
        if self.stale {
            return Err(std::io::Error::other("NXDOMAIN"));
        }
        let state = self.cloud.state.lock().unwrap();
        Ok(state
            .instances
            .iter()
            .filter(|i| i.label.ends_with("server"))
            .filter_map(|i| i.primary_ipv4())
            .collect())
    }
}

pub struct FakeProbe;

#[async_trait]
impl WebProbe for FakeProbe {
    async fn public_ipv4(&self) -> Result<Ipv4Addr> {
        Ok(DEPLOYER_IP)
    }

    async fn proxy_ready(&self, _url: &str) -> bool {
        true
    }
}

#[derive(Default)]
pub struct CoordinatorState {
    pub vouchers: Mutex<Vec<String>>,
    /// 1-based voucher request that gets refused
    pub fail_on: Option<usize>,
    pub listings: Mutex<usize>,
}

/// Coordinator where every issued voucher turns into a registered agent
pub struct FakeCoordinator {
    state: Arc<CoordinatorState>,
    access_key: String,
}

#[async_trait]
impl Coordinator for FakeCoordinator {
    fn domain(&self) -> &str {
        "cluster.example.com"
    }

    async fn create_voucher(&self, voucher: &str) -> htpfleet_cloud::Result<()> {
        let mut vouchers = self.state.vouchers.lock().unwrap();
        if self.state.fail_on == Some(vouchers.len() + 1) {
            return Err(CloudError::Rejected("createVoucher: not allowed".to_string()));
        }
        vouchers.push(voucher.to_string());
        Ok(())
    }

    async fn list_agents(&self) -> htpfleet_cloud::Result<AgentListing> {
        *self.state.listings.lock().unwrap() += 1;
        if self.access_key != VALID_ACCESS_KEY {
            return Ok(AgentListing::Unauthorized);
        }
        let vouchers = self.state.vouchers.lock().unwrap();
        Ok(AgentListing::Agents(
            (1..=vouchers.len() as u64)
                .map(|id| Agent {
                    id,
                    name: format!("agent-{}", id),
                })
                .collect(),
        ))
    }
}

pub struct FakeBackend {
    pub cloud: Arc<FakeCloud>,
    pub registrar: FakeRegistrar,
    pub resolver: FakeResolver,
    pub probe: FakeProbe,
    pub coordinator: Arc<CoordinatorState>,
}

impl FakeBackend {
    pub fn new(cloud: FakeCloud) -> Self {
        let cloud = Arc::new(cloud);
        Self {
            resolver: FakeResolver {
                cloud: cloud.clone(),
                stale: false,
            },
            cloud,
            registrar: FakeRegistrar::default(),
            probe: FakeProbe,
            coordinator: Arc::new(CoordinatorState::default()),
        }
    }

    pub fn cloud(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.cloud.state.lock().unwrap()
    }
}

impl Backend for FakeBackend {
    fn provider(&self) -> &dyn ComputeProvider {
        self.cloud.as_ref()
    }

    fn registrar(&self) -> &dyn DnsRegistrar {
        &self.registrar
    }

    fn resolver(&self) -> &dyn Resolver {
        &self.resolver
    }

    fn probe(&self) -> &dyn WebProbe {
        &self.probe
    }

    fn coordinator(&self, config: &Config) -> Result<Box<dyn Coordinator>> {
        Ok(Box::new(FakeCoordinator {
            state: self.coordinator.clone(),
            access_key: config.keys.hashtopolis.clone(),
        }))
    }
}

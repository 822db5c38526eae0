//! Linode implementation of [`ComputeProvider`]

use crate::client::LinodeClient;
use crate::error::{LinodeError, Result};
use crate::models::{
    ApiConfigProfile, ApiEvent, ApiFirewall, ApiInstance, ApiRegion, ApiRule, ApiType, ApiVpc,
    CreateFirewallBody, CreateInstanceBody, CreateSubnetBody, CreateVpcBody, FirewallRules,
    VpcInterfaceBody,
};
use async_trait::async_trait;
use htpfleet_cloud::{
    CloudError, ComputeProvider, CreateInstance, Firewall, FirewallId, InboundRule, Instance,
    InstanceId, InstanceType, Network, NetworkId, NetworkSpec, PollConfig, Region, RetryPolicy,
    poll_until, retry_when,
};
use rand::distributions::{Alphanumeric, DistString};
use std::net::Ipv4Addr;
use std::time::Duration;

const ROOT_PASSWORD_LENGTH: usize = 40;

/// Linode cloud provider
pub struct LinodeProvider {
    client: LinodeClient,
    event_poll: PollConfig,
}

impl LinodeProvider {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(LinodeClient::new(token)?))
    }

    pub fn with_client(client: LinodeClient) -> Self {
        Self {
            client,
            event_poll: PollConfig::new(Duration::from_secs(5), Duration::from_secs(600)),
        }
    }

    /// Override how account events are polled while waiting for a reboot
    pub fn with_event_poll(mut self, event_poll: PollConfig) -> Self {
        self.event_poll = event_poll;
        self
    }

    async fn get_instance(&self, id: InstanceId) -> Result<ApiInstance> {
        self.client
            .get(&format!("/linode/instances/{}", id))
            .await
    }

    async fn find_vpc(&self, label: &str) -> Result<ApiVpc> {
        self.client
            .get_all::<ApiVpc>("/vpcs")
            .await?
            .into_iter()
            .find(|v| v.label == label)
            .ok_or_else(|| LinodeError::NotFound(format!("VPC {}", label)))
    }

    /// Most recent `action` event for the instance, newest first
    async fn latest_event(&self, id: InstanceId, action: &str) -> Result<Option<ApiEvent>> {
        let filter = serde_json::json!({
            "entity.id": id,
            "entity.type": "linode",
            "action": action,
            "+order_by": "created",
            "+order": "desc",
        });
        let events: Vec<ApiEvent> = self.client.get_filtered("/account/events", &filter).await?;
        Ok(events.into_iter().find(|e| e.action == action))
    }
}

fn root_password() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), ROOT_PASSWORD_LENGTH)
}

#[async_trait]
impl ComputeProvider for LinodeProvider {
    fn name(&self) -> &str {
        "linode"
    }

    async fn list_regions(&self) -> htpfleet_cloud::Result<Vec<Region>> {
        let regions = self.client.get_all::<ApiRegion>("/regions").await?;
        Ok(regions.into_iter().map(Region::from).collect())
    }

    async fn list_instance_types(&self) -> htpfleet_cloud::Result<Vec<InstanceType>> {
        let types = self.client.get_all::<ApiType>("/linode/types").await?;
        Ok(types.into_iter().map(InstanceType::from).collect())
    }

    async fn create_instance(&self, request: &CreateInstance) -> htpfleet_cloud::Result<Instance> {
        tracing::info!(
            label = %request.label,
            region = %request.region,
            instance_type = %request.instance_type,
            "Creating instance"
        );

        let body = CreateInstanceBody {
            instance_type: &request.instance_type,
            region: &request.region,
            image: &request.image,
            label: &request.label,
            root_pass: root_password(),
            firewall_id: request.firewall_id,
            booted: false,
            stackscript_id: request.bootstrap_script_id,
            stackscript_data: &request.bootstrap_variables,
        };
        let created: ApiInstance = self.client.post("/linode/instances", &body).await?;

        tracing::debug!("Instance {} created with id {}", created.label, created.id);
        Ok(created.into())
    }

    async fn boot_instance(&self, id: InstanceId) -> htpfleet_cloud::Result<()> {
        tracing::info!("Booting instance {}", id);
        self.client
            .post_action(&format!("/linode/instances/{}/boot", id))
            .await?;
        Ok(())
    }

    async fn reboot_and_wait(&self, id: InstanceId, retry: &RetryPolicy) -> htpfleet_cloud::Result<()> {
        let baseline = self
            .latest_event(id, "linode_reboot")
            .await?
            .map(|e| e.id)
            .unwrap_or(0);

        let path = format!("/linode/instances/{}/reboot", id);
        let path = path.as_str();
        retry_when(
            retry,
            "reboot",
            |e| e.is_transient() || is_busy(e),
            move || async move {
                tracing::info!("Rebooting instance {}", id);
                self.client
                    .post_action(path)
                    .await
                    .map_err(CloudError::from)
            },
        )
        .await?;

        poll_until(
            &self.event_poll,
            "reboot to finish",
            move || async move {
                let latest = self.latest_event(id, "linode_reboot").await?;
                reboot_state(id, baseline, latest.as_ref()).transpose()
            },
            |elapsed| tracing::debug!("Waiting for reboot of {} ({}s)", id, elapsed.as_secs()),
        )
        .await
    }

    async fn list_instances(&self) -> htpfleet_cloud::Result<Vec<Instance>> {
        let instances = self.client.get_all::<ApiInstance>("/linode/instances").await?;
        Ok(instances.into_iter().map(Instance::from).collect())
    }

    async fn delete_instance(&self, id: InstanceId) -> htpfleet_cloud::Result<()> {
        tracing::info!("Deleting instance {}", id);
        self.client
            .delete(&format!("/linode/instances/{}", id))
            .await?;
        Ok(())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> htpfleet_cloud::Result<Network> {
        tracing::info!(label = %spec.label, region = %spec.region, "Creating VPC");

        let body = CreateVpcBody {
            label: &spec.label,
            region: &spec.region,
            subnets: vec![CreateSubnetBody {
                label: &spec.subnet_label,
                ipv4: &spec.subnet_cidr,
            }],
        };
        let vpc: ApiVpc = self.client.post("/vpcs", &body).await?;
        Ok(vpc.into())
    }

    async fn list_networks(&self) -> htpfleet_cloud::Result<Vec<Network>> {
        let vpcs = self.client.get_all::<ApiVpc>("/vpcs").await?;
        Ok(vpcs.into_iter().map(Network::from).collect())
    }

    async fn delete_network(&self, id: NetworkId) -> htpfleet_cloud::Result<()> {
        tracing::info!("Deleting VPC {}", id);
        self.client.delete(&format!("/vpcs/{}", id)).await?;
        Ok(())
    }

    async fn attach_to_private_network(
        &self,
        id: InstanceId,
        network_label: &str,
        subnet_label: &str,
        private_ip: Ipv4Addr,
    ) -> htpfleet_cloud::Result<()> {
        let config = self
            .client
            .get_all::<ApiConfigProfile>(&format!("/linode/instances/{}/configs", id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LinodeError::NotFound(format!("configuration profile of instance {}", id)))?;

        let vpc = self.find_vpc(network_label).await?;
        let subnet_id = vpc
            .subnets
            .iter()
            .find(|s| s.label == subnet_label)
            .map(|s| s.id)
            .ok_or_else(|| LinodeError::NotFound(format!("subnet {}", subnet_label)))?;

        let instance = self.get_instance(id).await?;
        let public_ip = instance.ipv4.first().copied().ok_or_else(|| {
            LinodeError::UnexpectedResponse(format!("instance {} has no public IPv4", id))
        })?;

        tracing::info!(
            instance = %instance.label,
            vpc = %vpc.label,
            %private_ip,
            "Attaching instance to VPC"
        );

        let body = VpcInterfaceBody::new(vpc.id, subnet_id, public_ip, private_ip);
        let _: serde_json::Value = self
            .client
            .post(
                &format!("/linode/instances/{}/configs/{}/interfaces", id, config.id),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn list_firewalls(&self) -> htpfleet_cloud::Result<Vec<Firewall>> {
        let firewalls = self
            .client
            .get_all::<ApiFirewall>("/networking/firewalls")
            .await?;
        Ok(firewalls.into_iter().map(Firewall::from).collect())
    }

    async fn create_firewall(&self, label: &str) -> htpfleet_cloud::Result<Firewall> {
        let body = CreateFirewallBody {
            label,
            rules: FirewallRules::inbound_only(Vec::new()),
        };
        let firewall: ApiFirewall = self.client.post("/networking/firewalls", &body).await?;
        Ok(firewall.into())
    }

    async fn replace_inbound_rules(
        &self,
        id: FirewallId,
        rules: &[InboundRule],
    ) -> htpfleet_cloud::Result<()> {
        for rule in rules {
            tracing::debug!("Firewall {} rule: {}", id, rule);
        }

        let body = FirewallRules::inbound_only(rules.iter().map(ApiRule::from).collect());
        let _: serde_json::Value = self
            .client
            .put(&format!("/networking/firewalls/{}/rules", id), &body)
            .await?;
        Ok(())
    }

    async fn delete_firewall(&self, id: FirewallId) -> htpfleet_cloud::Result<()> {
        tracing::info!("Deleting firewall {}", id);
        self.client
            .delete(&format!("/networking/firewalls/{}", id))
            .await?;
        Ok(())
    }
}

/// Outcome of a reboot given the newest `linode_reboot` event
///
/// Only events newer than `baseline` count. `None` means keep polling.
fn reboot_state(
    id: InstanceId,
    baseline: u64,
    latest: Option<&ApiEvent>,
) -> Option<htpfleet_cloud::Result<()>> {
    match latest {
        Some(event) if event.id > baseline && event.status == "finished" => Some(Ok(())),
        Some(event) if event.id > baseline && event.status == "failed" => Some(Err(
            CloudError::Rejected(format!("reboot of instance {} failed", id)),
        )),
        _ => None,
    }
}

/// Retry predicate for requests Linode refuses while another job is running
fn is_busy(err: &CloudError) -> bool {
    matches!(err, CloudError::Api { status: 400, message } if message.to_lowercase().contains("busy"))
}

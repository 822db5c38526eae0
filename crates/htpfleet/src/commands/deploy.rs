//! Deployment workflows
//!
//! Order matters throughout: instances are created unbooted, attached to
//! the VPC, and only then booted, so the bootstrap scripts see the private
//! interface on first boot.

use super::Session;
use crate::cluster::{AddressPlan, ClusterNames, MAX_AGENTS};
use crate::console;
use crate::error::{Result, WorkflowError};
use crate::steps::{DeployStep, Spinner, StepLog, format_clock};
use colored::Colorize;
use htpfleet_cloud::{
    CloudError, ComputeProvider, Coordinator, CreateInstance, DnsUpdate, FirewallId, InboundRule,
    Instance, InstanceType, NetworkSpec, PollConfig, Region, countdown, ensure_firewall,
    fetch_agents, issue_vouchers, poll_until, split_domain, wait_for_propagation,
};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// After this long the DNS wait notes that propagation can be slow
const SLOW_PROPAGATION_HINT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
    pub server: bool,
    pub agents: bool,
    /// Region id or label; asked for when absent
    pub region: Option<String>,
    /// Agent instance type id or label; asked for when absent
    pub agent_type: Option<String>,
    pub amount: Option<usize>,
}

impl DeployRequest {
    pub fn full() -> Self {
        Self {
            server: true,
            agents: true,
            ..Self::default()
        }
    }

    pub fn server_only() -> Self {
        Self {
            server: true,
            ..Self::default()
        }
    }

    pub fn agents_only() -> Self {
        Self {
            agents: true,
            ..Self::default()
        }
    }
}

struct AgentPlan {
    instance_type: InstanceType,
    amount: usize,
}

pub async fn deploy(session: &mut Session<'_>, request: &DeployRequest) -> Result<()> {
    let region = choose_region(session, request).await?;
    let agents = if request.agents {
        Some(choose_agents(session, request).await?)
    } else {
        None
    };
    confirm_plan(session, request, &region, agents.as_ref()).await?;

    let amount = agents.as_ref().map(|a| a.amount).unwrap_or(0);
    let addresses = AddressPlan::new(&session.config.provisioning.vpc_subnet, amount)?;
    let mut log = StepLog::new();

    setup_network(session, &region, &addresses, &mut log).await?;

    if request.server {
        deploy_server(session, &region, &addresses, &mut log).await?;
    }

    if let Some(agents) = &agents {
        deploy_agents(session, &region, agents, &addresses, &mut log).await?;
    }

    log.print_summary(session.config.domain());
    println!(
        "{} https://{}",
        "Visit".green().bold(),
        session.config.domain()
    );
    Ok(())
}

fn find_by_id_or_label<'a, T>(
    items: &'a [T],
    wanted: &str,
    kind: &'static str,
    keys: impl Fn(&T) -> (&str, &str),
) -> Result<&'a T> {
    items
        .iter()
        .find(|item| {
            let (id, label) = keys(item);
            id.eq_ignore_ascii_case(wanted) || label.eq_ignore_ascii_case(wanted)
        })
        .ok_or_else(|| WorkflowError::UnknownChoice {
            kind,
            value: wanted.to_string(),
        })
}

async fn choose_region(session: &mut Session<'_>, request: &DeployRequest) -> Result<Region> {
    let regions = session.backend.provider().list_regions().await?;
    if regions.is_empty() {
        return Err(CloudError::ResourceNotFound("regions".to_string()).into());
    }

    let region = match &request.region {
        Some(wanted) => find_by_id_or_label(&regions, wanted, "region", |r| {
            (r.id.as_str(), r.label.as_str())
        })?,
        None => {
            console::pick(&mut *session.prompt, "# Choose a region: ", &regions, |r| {
                r.label.as_str()
            })
            .await?
        }
    };
    Ok(region.clone())
}

async fn choose_agents(session: &mut Session<'_>, request: &DeployRequest) -> Result<AgentPlan> {
    let types = session.backend.provider().list_instance_types().await?;
    if types.is_empty() {
        return Err(CloudError::ResourceNotFound("instance types".to_string()).into());
    }

    let instance_type = match &request.agent_type {
        Some(wanted) => find_by_id_or_label(&types, wanted, "instance type", |t| {
            (t.id.as_str(), t.label.as_str())
        })?,
        None => {
            console::pick(&mut *session.prompt, "# Choose a type: ", &types, |t| {
                t.label.as_str()
            })
            .await?
        }
    }
    .clone();

    let amount = match request.amount {
        Some(n) if (1..=MAX_AGENTS).contains(&n) => n,
        Some(n) => {
            return Err(WorkflowError::InvalidAmount {
                value: n,
                max: MAX_AGENTS,
            });
        }
        None => console::choose_amount(&mut *session.prompt, MAX_AGENTS).await?,
    };

    Ok(AgentPlan {
        instance_type,
        amount,
    })
}

async fn confirm_plan(
    session: &mut Session<'_>,
    request: &DeployRequest,
    region: &Region,
    agents: Option<&AgentPlan>,
) -> Result<()> {
    let domain = session.config.domain();
    let summary = match (request.server, agents) {
        (true, Some(a)) => format!(
            "# A Hashtopolis server and {} {} instances will be deployed in {} at https://{}.",
            a.amount, a.instance_type.label, region.label, domain
        ),
        (true, None) => format!(
            "# A Hashtopolis server will be deployed in {} at https://{}.",
            region.label, domain
        ),
        (false, Some(a)) => format!(
            "# {} {} instances will be deployed in {}.",
            a.amount, a.instance_type.label, region.label
        ),
        (false, None) => return Ok(()),
    };

    if session.assume_yes {
        println!("{}", summary);
        return Ok(());
    }

    let question = format!("{} Continue?", summary);
    if console::confirm(&mut *session.prompt, &question).await? {
        Ok(())
    } else {
        Err(WorkflowError::Declined)
    }
}

/// Provider rejections of a VPC create mean it is already there
fn network_exists(err: &CloudError) -> bool {
    match err {
        CloudError::ResourceAlreadyExists(_) => true,
        CloudError::Api { status, .. } => (400..500).contains(status) && *status != 429,
        _ => false,
    }
}

async fn setup_network(
    session: &Session<'_>,
    region: &Region,
    addresses: &AddressPlan,
    log: &mut StepLog,
) -> Result<()> {
    let names = session.names();
    let spec = NetworkSpec {
        label: names.vpc(),
        region: region.id.clone(),
        subnet_label: names.subnet(),
        subnet_cidr: addresses.subnet(),
    };

    log.start_step(DeployStep::SetupNetwork);
    match session.backend.provider().create_network(&spec).await {
        Ok(network) => {
            log.step_success(Some(&format!("{} created ({})", network.label, spec.subnet_cidr)));
            Ok(())
        }
        Err(e) if network_exists(&e) => {
            tracing::debug!("VPC create rejected, assuming it exists: {}", e);
            log.step_success(Some("VPC already exists"));
            Ok(())
        }
        Err(e) => {
            log.step_failed(&e.to_string());
            Err(e.into())
        }
    }
}

/// Firewall step shared by server and agent deploys
async fn prepare_firewall(
    provider: &dyn ComputeProvider,
    label: &str,
    step: DeployStep,
    log: &mut StepLog,
) -> Result<FirewallId> {
    log.start_step(step);
    let result = ensure_firewall(provider, label).await;
    Ok(log.finish(result, Some(label))?)
}

async fn update_dns(session: &Session<'_>, ip: Ipv4Addr) -> htpfleet_cloud::Result<DnsUpdate> {
    let (zone, host) = split_domain(session.config.domain())?;
    session
        .backend
        .registrar()
        .upsert_a_record(&zone, &host, ip, session.config.provisioning.dns_ttl)
        .await
}

async fn deploy_server(
    session: &Session<'_>,
    region: &Region,
    addresses: &AddressPlan,
    log: &mut StepLog,
) -> Result<()> {
    let backend = session.backend;
    let provider = backend.provider();
    let config = &session.config;
    let timing = &config.timing;
    let names = session.names();
    let domain = config.domain();

    let firewall_id =
        prepare_firewall(provider, &names.server_firewall(), DeployStep::ServerFirewall, log)
            .await?;

    log.start_step(DeployStep::CreateServer);
    let request = CreateInstance {
        instance_type: config.provisioning.server_type.clone(),
        region: region.id.clone(),
        image: config.provisioning.image.clone(),
        label: names.server(),
        firewall_id,
        bootstrap_script_id: config.stackscripts.server,
        bootstrap_variables: BTreeMap::from([("DOMAIN_NAME".to_string(), domain.to_string())]),
    };
    let result = provider.create_instance(&request).await;
    let server = log.finish(result, None)?;
    let public_ip = server
        .primary_ipv4()
        .ok_or_else(|| WorkflowError::NoPublicAddress(server.label.clone()))?;
    log.log_detail(&format!("{} public IP {}", server.label, public_ip));

    log.start_step(DeployStep::UpdateDns);
    let result = update_dns(session, public_ip).await;
    match log.finish(result, None)? {
        DnsUpdate::Updated => log.log_detail(&format!("{} A {}", domain, public_ip)),
        DnsUpdate::ManualActionRequired { record, ip, reason } => {
            log.log_action(&reason);
            log.log_action("you need to update this record manually");
            log.log_action(&format!("{} A {}", record, ip));
        }
    }

    wait_for_dns(session, public_ip, log).await?;

    log.start_step(DeployStep::CertbotRule);
    let certbot = [InboundRule::new(
        "allow-certbot-verification",
        [80, 443],
        ["0.0.0.0/0".to_string()],
    )];
    let result = set_rules(provider, firewall_id, &certbot, log).await;
    log.finish(result, None)?;

    log.start_step(DeployStep::AttachServer);
    let result = provider
        .attach_to_private_network(server.id, &names.vpc(), &names.subnet(), addresses.server())
        .await;
    log.finish(result, Some(&format!("VPC IP {}", addresses.server())))?;

    log.start_step(DeployStep::BootServer);
    let result = provider.boot_instance(server.id).await;
    log.finish(result, Some("booted"))?;

    log.start_step(DeployStep::Bootstrap);
    let spinner = Spinner::new("sleeping");
    countdown(timing.bootstrap_sleep(), Duration::from_secs(1), |left| {
        spinner.set_message(format!("sleeping {}", format_clock(left)))
    })
    .await;
    spinner.finish();
    log.step_success(None);

    log.start_step(DeployStep::WaitProxy);
    let result = wait_for_proxy(session).await;
    log.finish(result, Some("nginx is up"))?;

    log.start_step(DeployStep::FinalRules);
    let my_ip = match backend.probe().public_ipv4().await {
        Ok(ip) => ip,
        Err(e) => {
            log.step_failed(&e.to_string());
            return Err(e);
        }
    };
    log.log_detail(&format!("this machine's IP: {}", my_ip));
    let rules = [
        InboundRule::new("allow-admin-only", [22, 80, 443], [format!("{}/32", my_ip)]),
        InboundRule::new("allow-agents", [8080, 443], [addresses.subnet()]),
    ];
    let result = set_rules(provider, firewall_id, &rules, log).await;
    log.finish(result, None)?;

    log.start_step(DeployStep::Reboot);
    let result = provider
        .reboot_and_wait(server.id, &session.provider_retry())
        .await;
    log.finish(result, Some("Hashtopolis server deployed"))?;

    Ok(())
}

async fn set_rules(
    provider: &dyn ComputeProvider,
    firewall_id: FirewallId,
    rules: &[InboundRule],
    log: &StepLog,
) -> htpfleet_cloud::Result<()> {
    for rule in rules {
        log.log_detail(&rule.to_string());
    }
    provider.replace_inbound_rules(firewall_id, rules).await
}

async fn wait_for_dns(session: &Session<'_>, expected: Ipv4Addr, log: &mut StepLog) -> Result<()> {
    let config = &session.config;
    let timeout = config.timing.dns_timeout();
    let ttl = Duration::from_secs(u64::from(config.provisioning.dns_ttl));

    log.start_step(DeployStep::WaitDns);
    let spinner = Spinner::new("waiting for proper DNS resolution");
    let matched = wait_for_propagation(
        session.backend.resolver(),
        config.domain(),
        expected,
        timeout,
        config.timing.dns_interval(),
        |elapsed| {
            let mut message = format!(
                "{}s TTL: {}s, timeout in {}s",
                ttl.as_secs(),
                ttl.saturating_sub(elapsed).as_secs(),
                timeout.saturating_sub(elapsed).as_secs()
            );
            if elapsed >= SLOW_PROPAGATION_HINT {
                message.push_str(" (sometimes it takes a while)");
            }
            spinner.set_message(message);
        },
    )
    .await;
    spinner.finish();

    if !matched {
        log.step_failed("no DNS change, timeout");
        return Err(WorkflowError::DnsTimeout {
            domain: config.domain().to_string(),
            secs: timeout.as_secs(),
        });
    }
    log.step_success(Some("DNS record match"));
    Ok(())
}

/// Poll the server URL until the reverse proxy answers
async fn wait_for_proxy(session: &Session<'_>) -> htpfleet_cloud::Result<()> {
    let timing = &session.config.timing;
    let url = format!("https://{}", session.config.domain());
    let url = url.as_str();
    let probe = session.backend.probe();

    let spinner = Spinner::new("waiting for nginx");
    let result = poll_until(
        &PollConfig::new(timing.health_interval(), timing.health_timeout()),
        "nginx",
        move || async move { Ok(probe.proxy_ready(url).await.then_some(())) },
        |elapsed| spinner.set_message(format!("waiting for nginx ({}s)", elapsed.as_secs())),
    )
    .await;
    spinner.finish();
    result
}

async fn deploy_agents(
    session: &mut Session<'_>,
    region: &Region,
    agents: &AgentPlan,
    addresses: &AddressPlan,
    log: &mut StepLog,
) -> Result<()> {
    let provider = session.backend.provider();
    let names = session.names();

    let firewall_id =
        prepare_firewall(provider, &names.agent_firewall(), DeployStep::AgentFirewall, log)
            .await?;

    log.start_step(DeployStep::WaitAccessKey);
    let result = wait_for_access_key(session).await;
    let coordinator = log.finish(result, Some("access key accepted"))?;

    log.start_step(DeployStep::IssueVouchers);
    let result = issue_vouchers(coordinator.as_ref(), agents.amount).await;
    let vouchers = log.finish(result, Some(&format!("{} vouchers issued", agents.amount)))?;

    log.start_step(DeployStep::CreateAgents);
    let result = launch_agents(
        session,
        region,
        &agents.instance_type,
        firewall_id,
        &vouchers,
        addresses,
        log,
    )
    .await;
    log.finish(result, Some(&format!("{} agents deployed", agents.amount)))?;

    log.start_step(DeployStep::WaitAgents);
    let result = wait_for_agents(session, coordinator.as_ref(), agents.amount).await;
    log.finish(result, Some("synchronized"))?;

    Ok(())
}

/// Block until the coordinator accepts the configured access key
///
/// The key only exists once the server is up, so the operator is asked to
/// put it into the settings file; the file is read again after every
/// attempt.
async fn wait_for_access_key(session: &mut Session<'_>) -> Result<Box<dyn Coordinator>> {
    loop {
        let coordinator = session.backend.coordinator(&session.config)?;
        let listing = fetch_agents(coordinator.as_ref(), &session.coordinator_retry()).await?;
        if listing.is_authorized() {
            return Ok(coordinator);
        }

        println!(
            "{}",
            format!(
                "Hashtopolis rejected the access key in {}",
                session.config_path.display()
            )
            .yellow()
        );
        session
            .prompt
            .ask("# Update your Hashtopolis API key in config file and hit enter")
            .await?;
        session.reload_config()?;
    }
}

fn agent_variables(voucher: &str, server_ip: Ipv4Addr) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("VOUCHER".to_string(), voucher.to_string()),
        (
            "DOWNLOAD_URL".to_string(),
            format!("https://{}/agents.php?download=1", server_ip),
        ),
        (
            "API_URL".to_string(),
            format!("http://{}:8080/api/server.php", server_ip),
        ),
    ])
}

/// Create, attach and boot one agent per voucher, strictly in sequence
async fn launch_agents(
    session: &Session<'_>,
    region: &Region,
    instance_type: &InstanceType,
    firewall_id: FirewallId,
    vouchers: &[String],
    addresses: &AddressPlan,
    log: &StepLog,
) -> Result<Vec<Instance>> {
    let provider = session.backend.provider();
    let config = &session.config;
    let names = ClusterNames::new(config.prefix());
    let mut launched = Vec::with_capacity(vouchers.len());

    for (i, voucher) in vouchers.iter().enumerate() {
        let index = i + 1;
        let label = names.agent(index);
        let private_ip = addresses.agent(index).ok_or_else(|| {
            WorkflowError::AddressPlan(format!("no private address for {}", label))
        })?;

        log.log_detail(&format!("deploying {} (VPC IP {})", label, private_ip));
        let request = CreateInstance {
            instance_type: instance_type.id.clone(),
            region: region.id.clone(),
            image: config.provisioning.image.clone(),
            label: label.clone(),
            firewall_id,
            bootstrap_script_id: config.stackscripts.agent,
            bootstrap_variables: agent_variables(voucher, addresses.server()),
        };
        let agent = provider.create_instance(&request).await?;
        provider
            .attach_to_private_network(agent.id, &names.vpc(), &names.subnet(), private_ip)
            .await?;
        provider.boot_instance(agent.id).await?;
        log.log_detail(&format!("{} done", label));
        launched.push(agent);
    }

    Ok(launched)
}

async fn wait_for_agents(
    session: &Session<'_>,
    coordinator: &dyn Coordinator,
    amount: usize,
) -> htpfleet_cloud::Result<()> {
    let timing = &session.config.timing;
    let retry = session.coordinator_retry();
    let retry = &retry;

    let spinner = Spinner::new("waiting for agents to synchronize with the server");
    let result = poll_until(
        &PollConfig::new(timing.agent_sync_interval(), timing.agent_sync_timeout()),
        "agent synchronization",
        move || async move {
            let listing = fetch_agents(coordinator, retry).await?;
            tracing::debug!("{} of {} agents registered", listing.count(), amount);
            Ok((listing.count() == amount).then_some(()))
        },
        |elapsed| spinner.set_message(format!("elapsed {} seconds", elapsed.as_secs())),
    )
    .await;
    spinner.finish();
    result
}

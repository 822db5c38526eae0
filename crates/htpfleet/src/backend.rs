//! Gateways a workflow talks to

use crate::error::Result;
use crate::net::{HttpProbe, WebProbe};
use htpfleet_cloud::{
    CloudError, ComputeProvider, Coordinator, DnsRegistrar, PollConfig, Resolver, SystemResolver,
};
use htpfleet_cloud_godaddy::GodaddyDns;
use htpfleet_cloud_linode::LinodeProvider;
use htpfleet_config::Config;
use htpfleet_hashtopolis::HashtopolisClient;

pub trait Backend: Send + Sync {
    fn provider(&self) -> &dyn ComputeProvider;

    fn registrar(&self) -> &dyn DnsRegistrar;

    fn resolver(&self) -> &dyn Resolver;

    fn probe(&self) -> &dyn WebProbe;

    /// Coordinator client for the current settings
    ///
    /// Built on demand because the access key can change while a
    /// deployment is waiting for it.
    fn coordinator(&self, config: &Config) -> Result<Box<dyn Coordinator>>;
}

/// Real API clients
pub struct LiveBackend {
    provider: LinodeProvider,
    registrar: GodaddyDns,
    resolver: SystemResolver,
    probe: HttpProbe,
}

impl LiveBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = LinodeProvider::new(config.keys.linode.clone())
            .map_err(CloudError::from)?
            .with_event_poll(PollConfig::new(
                config.timing.reboot_poll_interval(),
                config.timing.reboot_timeout(),
            ));
        let registrar = GodaddyDns::new(
            config.keys.godaddy_key.clone(),
            config.keys.godaddy_secret.clone(),
        )
        .map_err(CloudError::from)?;
        let probe = HttpProbe::new(
            config.provisioning.public_ip_url.clone(),
            config.timing.health_interval(),
        );

        Ok(Self {
            provider,
            registrar,
            resolver: SystemResolver,
            probe,
        })
    }
}

impl Backend for LiveBackend {
    fn provider(&self) -> &dyn ComputeProvider {
        &self.provider
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
        let client = HashtopolisClient::new(config.domain(), config.keys.hashtopolis.clone())
            .map_err(CloudError::from)?;
        Ok(Box::new(client))
    }
}

//! Settings file model
//!
//! The file has three required groups (`keys`, `stackscripts`, `settings`)
//! and two optional ones (`provisioning`, `timing`) whose defaults match the
//! values the tool has always used, so older files keep loading unchanged.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Prefix used when the operator leaves the prompt empty
pub const DEFAULT_CLUSTER_PREFIX: &str = "htp_cluster_";

/// Placeholder coordinator key written on first run; the real key only
/// exists once the server has been deployed and an API key created in it.
pub const PLACEHOLDER_ACCESS_KEY: &str = "1234abcd";

/// Complete settings for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API credentials
    pub keys: Keys,

    /// Bootstrap script identifiers
    pub stackscripts: StackScripts,

    /// Operational settings
    pub settings: ClusterSettings,

    #[serde(default, skip_serializing_if = "Provisioning::is_default")]
    pub provisioning: Provisioning,

    #[serde(default, skip_serializing_if = "Timing::is_default")]
    pub timing: Timing,
}

impl Config {
    /// Check the few things the workflows rely on
    ///
    /// The prefix is the only ownership marker for cloud resources, so an
    /// empty one would make teardown match the whole account.
    pub fn validate(&self) -> Result<()> {
        if self.settings.cluster_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "settings.cluster_prefix must not be empty".to_string(),
            ));
        }

        let labels: Vec<&str> = self.settings.domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "settings.domain '{}' is not a fully qualified domain name",
                self.settings.domain
            )));
        }

        Ok(())
    }

    pub fn prefix(&self) -> &str {
        &self.settings.cluster_prefix
    }

    pub fn domain(&self) -> &str {
        &self.settings.domain
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keys {
    /// Compute provider API token
    #[serde(deserialize_with = "lenient_string")]
    pub linode: String,
    #[serde(deserialize_with = "lenient_string")]
    pub godaddy_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub godaddy_secret: String,
    /// Coordinator access key
    #[serde(deserialize_with = "lenient_string")]
    pub hashtopolis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackScripts {
    #[serde(deserialize_with = "lenient_u64")]
    pub server: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub agent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub cluster_prefix: String,
    pub domain: String,
    /// Run a forced teardown when a workflow is interrupted
    #[serde(
        default,
        deserialize_with = "lenient_flag",
        serialize_with = "flag_as_int"
    )]
    pub autoclean_when_failed: bool,
}

/// What gets created, and where the deployer's public address comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provisioning {
    pub image: String,
    pub server_type: String,
    pub vpc_subnet: String,
    pub public_ip_url: String,
    pub dns_ttl: u32,
}

impl Default for Provisioning {
    fn default() -> Self {
        Self {
            image: "linode/debian11".to_string(),
            server_type: "g6-standard-2".to_string(),
            vpc_subnet: "10.0.77.0/24".to_string(),
            public_ip_url: "https://forcedeye.com/ip".to_string(),
            dns_ttl: 600,
        }
    }
}

impl Provisioning {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Poll intervals and upper bounds, in seconds
///
/// The bounds on agent check-in and retries are deliberately huge: unattended
/// runs are expected to wait out slow providers rather than give up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub dns_timeout_secs: u64,
    pub dns_interval_secs: u64,
    pub bootstrap_sleep_secs: u64,
    pub health_interval_secs: u64,
    pub health_timeout_secs: u64,
    pub agent_sync_interval_secs: u64,
    pub agent_sync_timeout_secs: u64,
    pub provider_retry_delay_secs: u64,
    pub coordinator_retry_delay_secs: u64,
    pub reboot_poll_interval_secs: u64,
    pub reboot_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            dns_timeout_secs: 800,
            dns_interval_secs: 11,
            bootstrap_sleep_secs: 230,
            health_interval_secs: 4,
            health_timeout_secs: 60 * 60,
            agent_sync_interval_secs: 10,
            agent_sync_timeout_secs: 7 * 24 * 60 * 60,
            provider_retry_delay_secs: 10,
            coordinator_retry_delay_secs: 5,
            reboot_poll_interval_secs: 5,
            reboot_timeout_secs: 600,
            max_retries: 100_000,
        }
    }
}

impl Timing {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn dns_interval(&self) -> Duration {
        Duration::from_secs(self.dns_interval_secs)
    }

    pub fn bootstrap_sleep(&self) -> Duration {
        Duration::from_secs(self.bootstrap_sleep_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn agent_sync_interval(&self) -> Duration {
        Duration::from_secs(self.agent_sync_interval_secs)
    }

    pub fn agent_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_sync_timeout_secs)
    }

    pub fn provider_retry_delay(&self) -> Duration {
        Duration::from_secs(self.provider_retry_delay_secs)
    }

    pub fn coordinator_retry_delay(&self) -> Duration {
        Duration::from_secs(self.coordinator_retry_delay_secs)
    }

    pub fn reboot_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reboot_poll_interval_secs)
    }

    pub fn reboot_timeout(&self) -> Duration {
        Duration::from_secs(self.reboot_timeout_secs)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Bool(bool),
    Text(String),
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a numeric id, got '{}'", s))),
        NumberOrString::Bool(b) => Err(serde::de::Error::custom(format!(
            "expected a numeric id, got {}",
            b
        ))),
    }
}

// YAML reads an all-digit key as a number
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Bool(b) => b.to_string(),
        NumberOrString::Text(s) => s,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n == 1),
        NumberOrString::Bool(b) => Ok(b),
        NumberOrString::Text(s) => Ok(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )),
    }
}

fn flag_as_int<S>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u8(u8::from(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"
keys:
  godaddy_key: gk
  godaddy_secret: gs
  hashtopolis: 12345678
  linode: tok
settings:
  autoclean_when_failed: 0
  cluster_prefix: htp_cluster_
  domain: cluster.example.com
stackscripts:
  agent: '456'
  server: '123'
"#;

    #[test]
    fn test_legacy_file_loads_with_defaults() {
        let config: Config = serde_yaml::from_str(LEGACY).unwrap();
        assert_eq!(config.stackscripts.server, 123);
        assert_eq!(config.stackscripts.agent, 456);
        assert!(!config.settings.autoclean_when_failed);
        assert_eq!(config.keys.hashtopolis, "12345678");
        assert_eq!(config.provisioning, Provisioning::default());
        assert_eq!(config.timing.dns_timeout(), Duration::from_secs(800));
        assert_eq!(config.timing.dns_interval(), Duration::from_secs(11));
        assert_eq!(config.timing.reboot_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.timing.reboot_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_timing_section() {
        let yaml = format!("{}timing:\n  reboot_timeout_secs: 90\n", LEGACY);
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.timing.reboot_timeout(), Duration::from_secs(90));
        assert_eq!(config.timing.reboot_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.timing.dns_timeout(), Duration::from_secs(800));
    }

    #[test]
    fn test_autoclean_flag_forms() {
        for (raw, expected) in [("1", true), ("'1'", true), ("true", true), ("0", false)] {
            let yaml = LEGACY.replace("autoclean_when_failed: 0", &format!("autoclean_when_failed: {}", raw));
            let config: Config = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(config.settings.autoclean_when_failed, expected, "{}", raw);
        }
    }

    #[test]
    fn test_defaults_are_not_written() {
        let config: Config = serde_yaml::from_str(LEGACY).unwrap();
        let written = serde_yaml::to_string(&config).unwrap();
        assert!(!written.contains("provisioning"));
        assert!(!written.contains("timing"));
        assert!(written.contains("autoclean_when_failed: 0"));
    }

    #[test]
    fn test_validate() {
        let mut config: Config = serde_yaml::from_str(LEGACY).unwrap();
        assert!(config.validate().is_ok());

        config.settings.domain = "localhost".to_string();
        assert!(config.validate().is_err());

        config.settings.domain = "cluster.example.com".to_string();
        config.settings.cluster_prefix = "  ".to_string();
        assert!(config.validate().is_err());
    }
}

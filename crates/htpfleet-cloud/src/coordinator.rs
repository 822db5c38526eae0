//! Cracking coordinator abstraction (voucher issuance, agent listing)

use crate::error::Result;
use crate::retry::{RetryPolicy, retry_transient};
use async_trait::async_trait;
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};

/// Length of a registration voucher
pub const VOUCHER_LENGTH: usize = 16;

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Base domain the coordinator is served from
    fn domain(&self) -> &str;

    /// Register a single-use voucher
    ///
    /// Fails with `CloudError::Connection` when the coordinator cannot be
    /// reached and `CloudError::Rejected` when it refuses the voucher.
    async fn create_voucher(&self, voucher: &str) -> Result<()>;

    /// List registered agents, or report that the access key is not accepted
    async fn list_agents(&self) -> Result<AgentListing>;
}

/// Result of an agent listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentListing {
    /// The coordinator rejected the access key
    Unauthorized,
    Agents(Vec<Agent>),
}

impl AgentListing {
    pub fn is_authorized(&self) -> bool {
        !matches!(self, AgentListing::Unauthorized)
    }

    /// Number of agents; zero when unauthorized
    pub fn count(&self) -> usize {
        match self {
            AgentListing::Unauthorized => 0,
            AgentListing::Agents(agents) => agents.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: u64,
    pub name: String,
}

/// Random 16-character alphanumeric voucher
pub fn generate_voucher() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), VOUCHER_LENGTH)
}

/// Issue `count` vouchers, one API call each
///
/// Stops at the first failure and returns it: a partially issued batch must
/// never be used to deploy part of a fleet.
pub async fn issue_vouchers(coordinator: &dyn Coordinator, count: usize) -> Result<Vec<String>> {
    let mut vouchers = Vec::with_capacity(count);

    for index in 0..count {
        let voucher = generate_voucher();
        coordinator.create_voucher(&voucher).await.map_err(|e| {
            tracing::error!(
                issued = index,
                requested = count,
                error = %e,
                "Voucher issuance failed"
            );
            e
        })?;
        tracing::debug!("Issued voucher {}/{}", index + 1, count);
        vouchers.push(voucher);
    }

    Ok(vouchers)
}

/// List agents, retrying while the coordinator is unreachable
pub async fn fetch_agents(
    coordinator: &dyn Coordinator,
    retry: &RetryPolicy,
) -> Result<AgentListing> {
    retry_transient(retry, "list agents", move || coordinator.list_agents()).await
}

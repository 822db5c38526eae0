//! htpfleet cloud abstractions
//!
//! Gateway traits shared by the orchestrator and the concrete API clients,
//! plus the retry and polling primitives every workflow step relies on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  htpfleet CLI                    │
//! │      (deploy / deploy-agents / remove ...)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                htpfleet-cloud                    │
//! │  trait ComputeProvider / DnsRegistrar /          │
//! │        Coordinator / Resolver                    │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │ retry / wait │  │ vouchers / DNS split │     │
//! │  └──────────────┘  └──────────────────────┘     │
//! └───────┬─────────────────┬──────────────┬────────┘
//!         │                 │              │
//! ┌───────▼───────┐ ┌───────▼──────┐ ┌─────▼────────┐
//! │    linode     │ │   godaddy    │ │ hashtopolis  │
//! └───────────────┘ └──────────────┘ └──────────────┘
//! ```

pub mod coordinator;
pub mod dns;
pub mod error;
pub mod provider;
pub mod retry;
pub mod wait;

// Re-exports
pub use coordinator::{
    Agent, AgentListing, Coordinator, VOUCHER_LENGTH, fetch_agents, generate_voucher,
    issue_vouchers,
};
pub use dns::{
    DnsRegistrar, DnsUpdate, Resolver, SystemResolver, split_domain, wait_for_propagation,
};
pub use error::{CloudError, Result};
pub use provider::{
    ComputeProvider, CreateInstance, Firewall, FirewallId, InboundRule, Instance, InstanceId,
    InstanceType, Network, NetworkId, NetworkSpec, Region, Subnet, ensure_firewall,
};
pub use retry::{RetryPolicy, retry_transient, retry_when};
pub use wait::{PollConfig, countdown, poll_until};

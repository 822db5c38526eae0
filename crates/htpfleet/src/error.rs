//! Errors that end a workflow

use crate::console::ConsoleError;
use htpfleet_cloud::CloudError;
use htpfleet_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The operator answered "n"; not a failure
    #[error("declined by operator")]
    Declined,

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error("no DNS change for {domain} within {secs}s")]
    DnsTimeout { domain: String, secs: u64 },

    #[error("instance {0} has no public IPv4 address")]
    NoPublicAddress(String),

    #[error("invalid address plan: {0}")]
    AddressPlan(String),

    #[error("cannot determine this machine's public IP: {0}")]
    PublicIp(String),

    #[error("amount must be between 1 and {max}, got {value}")]
    InvalidAmount { value: usize, max: usize },

    #[error("unknown {kind} '{value}'")]
    UnknownChoice { kind: &'static str, value: String },
}

impl WorkflowError {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkflowError::Declined => 0,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

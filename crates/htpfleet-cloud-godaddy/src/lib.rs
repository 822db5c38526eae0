//! GoDaddy DNS registrar for htpfleet
//!
//! Implements [`htpfleet_cloud::DnsRegistrar`] with `sso-key` authentication.
//! Accounts below GoDaddy's API tier get
//! [`DnsUpdate::ManualActionRequired`](htpfleet_cloud::DnsUpdate) instead of
//! an error, so provisioning can continue while the operator sets the record.

pub mod dns;
pub mod error;

pub use dns::GodaddyDns;
pub use error::{GodaddyError, Result};

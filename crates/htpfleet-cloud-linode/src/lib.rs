//! Linode provider for htpfleet
//!
//! Implements [`htpfleet_cloud::ComputeProvider`] on top of the Linode API v4:
//! instances, VPCs, cloud firewalls and the account event feed used to
//! observe reboots.
//!
//! # Example
//!
//! ```ignore
//! use htpfleet_cloud::ComputeProvider;
//! use htpfleet_cloud_linode::LinodeProvider;
//!
//! let provider = LinodeProvider::new(token)?;
//! for region in provider.list_regions().await? {
//!     println!("{} ({})", region.id, region.label);
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod provider;

pub use client::LinodeClient;
pub use error::{LinodeError, Result};
pub use provider::LinodeProvider;

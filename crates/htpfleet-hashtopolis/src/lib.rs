//! Hashtopolis coordinator client for htpfleet
//!
//! Implements [`htpfleet_cloud::Coordinator`] against the user API:
//! `createVoucher` for agent registration and `listAgents` to watch the
//! fleet come online.

pub mod client;
pub mod error;

pub use client::HashtopolisClient;
pub use error::{HashtopolisError, Result};

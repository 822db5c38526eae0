//! Plain HTTP checks made from the deployer's machine

use crate::error::{Result, WorkflowError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Body the reverse proxy serves until Hashtopolis itself is up
pub const PROXY_READY_MARKER: &str = "502 Bad Gateway";

#[async_trait]
pub trait WebProbe: Send + Sync {
    /// This machine's address as seen from the internet
    async fn public_ipv4(&self) -> Result<Ipv4Addr>;

    /// Whether `url` already answers through the reverse proxy
    async fn proxy_ready(&self, url: &str) -> bool;
}

pub struct HttpProbe {
    client: reqwest::Client,
    public_ip_url: String,
    request_timeout: Duration,
}

impl HttpProbe {
    pub fn new(public_ip_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            public_ip_url: public_ip_url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl WebProbe for HttpProbe {
    async fn public_ipv4(&self) -> Result<Ipv4Addr> {
        let body = self
            .client
            .get(&self.public_ip_url)
            .timeout(self.request_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WorkflowError::PublicIp(e.to_string()))?
            .text()
            .await
            .map_err(|e| WorkflowError::PublicIp(e.to_string()))?;

        parse_public_ip(&body).ok_or_else(|| {
            WorkflowError::PublicIp(format!(
                "unexpected answer from {}: {:?}",
                self.public_ip_url,
                body.chars().take(60).collect::<String>()
            ))
        })
    }

    async fn proxy_ready(&self, url: &str) -> bool {
        match self.client.get(url).timeout(self.request_timeout).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body.contains(PROXY_READY_MARKER),
                Err(e) => {
                    tracing::debug!("Reading {} failed: {}", url, e);
                    false
                }
            },
            Err(e) => {
                // connection refused and certificate errors are expected while booting
                tracing::debug!("{} not reachable yet: {}", url, e);
                false
            }
        }
    }
}

/// First whitespace separated token of an echo service answer
fn parse_public_ip(body: &str) -> Option<Ipv4Addr> {
    body.split_whitespace().next()?.parse().ok()
}

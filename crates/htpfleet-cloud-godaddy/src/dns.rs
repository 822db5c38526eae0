//! GoDaddy DNS API client
//!
//! Only A records are managed: `PUT /v1/domains/{zone}/records/A/{host}`
//! replaces every A record for the host in one call.

use crate::error::{GodaddyError, Result};
use async_trait::async_trait;
use htpfleet_cloud::{DnsRegistrar, DnsUpdate};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

const GODADDY_API_BASE: &str = "https://api.godaddy.com/v1";

/// Message GoDaddy returns to accounts below its API access tier
const ACCESS_DENIED_MESSAGE: &str = "Authenticated user is not allowed access";

/// GoDaddy DNS manager
pub struct GodaddyDns {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Serialize)]
struct ARecordBody {
    data: String,
    ttl: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl GodaddyDns {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() || api_secret.trim().is_empty() {
            return Err(GodaddyError::MissingCredentials);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: GODADDY_API_BASE.to_string(),
            api_key,
            api_secret,
        })
    }

    /// Use the OTE sandbox or another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorization(&self) -> String {
        format!("sso-key {}:{}", self.api_key, self.api_secret)
    }

    async fn put_a_record(&self, zone: &str, host: &str, ip: Ipv4Addr, ttl: u32) -> Result<DnsUpdate> {
        let url = format!("{}/domains/{}/records/A/{}", self.base_url, zone, host);
        let body = [ARecordBody {
            data: ip.to_string(),
            ttl,
        }];

        tracing::debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(DnsUpdate::Updated);
        }

        let text = response.text().await.unwrap_or_default();
        classify_failure(status.as_u16(), &text, record_name(zone, host), ip)
    }
}

/// Fully qualified record name for display
fn record_name(zone: &str, host: &str) -> String {
    if host == "@" {
        zone.to_string()
    } else {
        format!("{}.{}", host, zone)
    }
}

/// Turn a non-2xx answer into an advisory or an error
fn classify_failure(status: u16, body: &str, record: String, ip: Ipv4Addr) -> Result<DnsUpdate> {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

    if parsed.message == ACCESS_DENIED_MESSAGE {
        return Ok(DnsUpdate::ManualActionRequired {
            record,
            ip,
            reason: "GoDaddy grants API access only to accounts with at least 10 domains"
                .to_string(),
        });
    }

    let message = if parsed.message.is_empty() {
        body.trim().to_string()
    } else {
        parsed.message
    };
    Err(GodaddyError::Api {
        status,
        code: parsed.code,
        message,
    })
}

#[async_trait]
impl DnsRegistrar for GodaddyDns {
    fn name(&self) -> &str {
        "godaddy"
    }

    async fn upsert_a_record(
        &self,
        zone: &str,
        host: &str,
        ip: Ipv4Addr,
        ttl: u32,
    ) -> htpfleet_cloud::Result<DnsUpdate> {
        tracing::info!(zone, host, %ip, ttl, "Updating A record");
        Ok(self.put_a_record(zone, host, ip, ttl).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 10);

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            GodaddyDns::new("key", ""),
            Err(GodaddyError::MissingCredentials)
        ));
    }

    #[test]
    fn test_authorization_header() {
        let dns = GodaddyDns::new("abc", "xyz").unwrap();
        assert_eq!(dns.authorization(), "sso-key abc:xyz");
    }

    #[test]
    fn test_record_body_shape() {
        let body = [ARecordBody {
            data: IP.to_string(),
            ttl: 600,
        }];
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!([{"data": "203.0.113.10", "ttl": 600}])
        );
    }

    #[test]
    fn test_access_tier_is_manual_action() {
        let body = r#"{"code":"ACCESS_DENIED","message":"Authenticated user is not allowed access"}"#;
        let outcome =
            classify_failure(403, body, record_name("example.com", "cluster"), IP).unwrap();

        match outcome {
            DnsUpdate::ManualActionRequired { record, ip, .. } => {
                assert_eq!(record, "cluster.example.com");
                assert_eq!(ip, IP);
            }
            other => panic!("expected manual action, got {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let body = r#"{"code":"UNKNOWN_DOMAIN","message":"The given domain is not registered"}"#;
        let err = classify_failure(404, body, record_name("example.com", "@"), IP).unwrap_err();

        match err {
            GodaddyError::Api { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "UNKNOWN_DOMAIN");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_error_body() {
        let err = classify_failure(502, "<html>bad gateway</html>", "x".into(), IP).unwrap_err();
        let cloud: htpfleet_cloud::CloudError = err.into();
        assert!(cloud.is_transient());
    }
}

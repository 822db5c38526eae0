//! Client for the Hashtopolis user API (`/api/user.php`)

use crate::error::{HashtopolisError, Result};
use async_trait::async_trait;
use htpfleet_cloud::{Agent, AgentListing, Coordinator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message Hashtopolis answers with when the access key is wrong
const INVALID_ACCESS_KEY: &str = "Invalid access key!";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HashtopolisClient {
    http: reqwest::Client,
    domain: String,
    access_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserApiRequest<'a> {
    section: &'static str,
    request: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voucher: Option<&'a str>,
    access_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserApiResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    agents: Vec<ApiAgent>,
}

impl UserApiResponse {
    fn is_ok(&self) -> bool {
        self.response == "OK"
    }

    fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("response {:?}", self.response))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAgent {
    agent_id: u64,
    #[serde(default)]
    name: String,
}

impl From<ApiAgent> for Agent {
    fn from(a: ApiAgent) -> Self {
        Agent {
            id: a.agent_id,
            name: a.name,
        }
    }
}

impl HashtopolisClient {
    pub fn new(domain: impl Into<String>, access_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            domain: domain.into(),
            access_key: access_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("https://{}/api/user.php", self.domain)
    }

    async fn call(&self, request: &UserApiRequest<'_>) -> Result<UserApiResponse> {
        tracing::debug!(request = request.request, "POST {}", self.endpoint());

        let response = self
            .http
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    HashtopolisError::Unreachable {
                        domain: self.domain.clone(),
                        source: e,
                    }
                } else {
                    HashtopolisError::Http(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(status, &body)
    }
}

fn parse_response(status: u16, body: &str) -> Result<UserApiResponse> {
    serde_json::from_str(body).map_err(|_| HashtopolisError::InvalidResponse {
        status,
        body: body.chars().take(200).collect(),
    })
}

fn agent_listing(response: UserApiResponse) -> Result<AgentListing> {
    if response.is_ok() {
        return Ok(AgentListing::Agents(
            response.agents.into_iter().map(Agent::from).collect(),
        ));
    }

    if response.message.as_deref() == Some(INVALID_ACCESS_KEY) {
        return Ok(AgentListing::Unauthorized);
    }

    Err(HashtopolisError::Rejected {
        request: "listAgents".to_string(),
        message: response.message(),
    })
}

#[async_trait]
impl Coordinator for HashtopolisClient {
    fn domain(&self) -> &str {
        &self.domain
    }

    async fn create_voucher(&self, voucher: &str) -> htpfleet_cloud::Result<()> {
        let response = self
            .call(&UserApiRequest {
                section: "agent",
                request: "createVoucher",
                voucher: Some(voucher),
                access_key: &self.access_key,
            })
            .await?;

        if !response.is_ok() {
            return Err(HashtopolisError::Rejected {
                request: "createVoucher".to_string(),
                message: response.message(),
            }
            .into());
        }
        Ok(())
    }

    async fn list_agents(&self) -> htpfleet_cloud::Result<AgentListing> {
        let response = self
            .call(&UserApiRequest {
                section: "agent",
                request: "listAgents",
                voucher: None,
                access_key: &self.access_key,
            })
            .await?;

        Ok(agent_listing(response)?)
    }
}

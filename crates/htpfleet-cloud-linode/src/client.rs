//! Thin Linode API v4 HTTP client
//!
//! Bearer token authentication, error body decoding and page walking.
//! Endpoint semantics live in [`crate::provider`].

use crate::error::{LinodeError, Result};
use crate::models::{ErrorBody, Page};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const LINODE_API_BASE: &str = "https://api.linode.com/v4";
const PAGE_SIZE: u32 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LinodeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl LinodeClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(LinodeError::MissingToken);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("htpfleet/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: LINODE_API_BASE.to_string(),
            token,
        })
    }

    /// Point the client at another API root (staging, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("GET {}", path);
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    /// Fetch every page of a collection endpoint
    pub async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            tracing::debug!("GET {} (page {})", path, page);
            let request = self
                .http
                .get(self.url(path))
                .query(&[("page", page), ("page_size", PAGE_SIZE)]);
            let response: Page<T> = self.send(request).await?.json().await?;

            items.extend(response.data);
            if response.page >= response.pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// First page of a collection narrowed by an `X-Filter` expression
    pub async fn get_filtered<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: &serde_json::Value,
    ) -> Result<Vec<T>> {
        tracing::debug!("GET {} filter={}", path, filter);
        let request = self
            .http
            .get(self.url(path))
            .header("X-Filter", filter.to_string());
        let response: Page<T> = self.send(request).await?.json().await?;
        Ok(response.data)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", path);
        let response = self.send(self.http.post(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    /// POST without a body, discarding the (empty) response
    pub async fn post_action(&self, path: &str) -> Result<()> {
        tracing::debug!("POST {}", path);
        self.send(self.http.post(self.url(path)).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("PUT {}", path);
        let response = self.send(self.http.put(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        tracing::debug!("DELETE {}", path);
        self.send(self.http.delete(self.url(path))).await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(LinodeError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Collapse a Linode error body into one line
///
/// `{"errors": [{"reason": "...", "field": "label"}]}` becomes
/// `label: ...`; anything else is passed through trimmed.
pub(crate) fn error_message(body: &str) -> String {
    let reasons = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| {
            parsed
                .errors
                .into_iter()
                .map(|e| match e.field {
                    Some(field) => format!("{}: {}", field, e.reason),
                    None => e.reason,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if reasons.is_empty() {
        body.trim().to_string()
    } else {
        reasons.join("; ")
    }
}

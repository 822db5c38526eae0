//! Hashtopolis client error types

use htpfleet_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashtopolisError {
    #[error("Cannot reach Hashtopolis at {domain} (incorrect domain?): {source}")]
    Unreachable {
        domain: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Hashtopolis refused {request}: {message}")]
    Rejected { request: String, message: String },

    #[error("Unexpected response ({status}): {body}")]
    InvalidResponse { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<HashtopolisError> for CloudError {
    fn from(err: HashtopolisError) -> Self {
        match err {
            HashtopolisError::Unreachable { .. } => CloudError::Connection(err.to_string()),
            HashtopolisError::Http(e) => match e.status() {
                Some(status) => CloudError::Api {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                // no status: the exchange broke off before a response was read
                None => CloudError::Connection(e.to_string()),
            },
            HashtopolisError::Rejected { .. } => CloudError::Rejected(err.to_string()),
            HashtopolisError::InvalidResponse { status, body } => CloudError::Api {
                status,
                message: body,
            },
            HashtopolisError::Json(e) => CloudError::Json(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HashtopolisError>;

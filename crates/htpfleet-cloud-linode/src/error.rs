//! Linode provider error types

use htpfleet_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinodeError {
    #[error("Linode API token is not configured")]
    MissingToken,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Linode API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LinodeError> for CloudError {
    fn from(err: LinodeError) -> Self {
        match err {
            LinodeError::MissingToken => CloudError::InvalidConfig(err.to_string()),
            LinodeError::Http(e) => {
                if let Some(status) = e.status() {
                    CloudError::Api {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else if e.is_decode() {
                    CloudError::Api {
                        status: 0,
                        message: format!("undecodable response: {}", e),
                    }
                } else {
                    CloudError::Connection(e.to_string())
                }
            }
            LinodeError::Api { status, message } if status == 401 || status == 403 => {
                CloudError::AuthenticationFailed(message)
            }
            LinodeError::Api { status, message } => CloudError::Api { status, message },
            LinodeError::NotFound(what) => CloudError::ResourceNotFound(what),
            LinodeError::UnexpectedResponse(message) => CloudError::Api { status: 0, message },
            LinodeError::Json(e) => CloudError::Json(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_cloud_error() {
        let auth: CloudError = LinodeError::Api {
            status: 401,
            message: "Invalid Token".to_string(),
        }
        .into();
        assert!(matches!(auth, CloudError::AuthenticationFailed(_)));

        let outage: CloudError = LinodeError::Api {
            status: 502,
            message: "Bad Gateway".to_string(),
        }
        .into();
        assert!(outage.is_transient());

        let missing: CloudError = LinodeError::NotFound("VPC htp-cluster-vpc".to_string()).into();
        assert!(matches!(missing, CloudError::ResourceNotFound(_)));
    }
}

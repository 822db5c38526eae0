//! GoDaddy registrar error types

use htpfleet_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GodaddyError {
    #[error("GoDaddy API key or secret is not configured")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GoDaddy API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GodaddyError> for CloudError {
    fn from(err: GodaddyError) -> Self {
        match err {
            GodaddyError::MissingCredentials => CloudError::InvalidConfig(err.to_string()),
            GodaddyError::Http(e) => match e.status() {
                Some(status) => CloudError::Api {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => CloudError::Connection(e.to_string()),
            },
            GodaddyError::Api {
                status: 401,
                message,
                ..
            } => CloudError::AuthenticationFailed(message),
            GodaddyError::Api {
                status,
                code,
                message,
            } => CloudError::Api {
                status,
                message: format!("{}: {}", code, message),
            },
            GodaddyError::Json(e) => CloudError::Json(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, GodaddyError>;

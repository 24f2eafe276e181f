//! Error types for node client operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request got no answer within its client-side timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Node returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True for connection-level failures, as opposed to the node answering with an error.
    pub fn is_connection(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            ClientError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

impl ClientError {
    /// Classify a transport failure, keeping client-side timeouts apart.
    pub(crate) fn transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            let path = e.url().map(|u| u.path().to_string()).unwrap_or_default();
            ClientError::Timeout(path)
        } else {
            ClientError::Http(e)
        }
    }
}

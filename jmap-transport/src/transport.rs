use async_trait::async_trait;
use bytes::Bytes;
use jmap_core::JmapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The server refused the credential (401/403).
    #[error("HTTP {status}: credential rejected")]
    Unauthorized { status: u16, body: String },
    #[error("HTTP {status} {status_text}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl From<TransportError> for JmapError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized { status, body } => JmapError::Authentication {
                status,
                message: if body.is_empty() {
                    "credential rejected".to_string()
                } else {
                    body
                },
            },
            TransportError::Status {
                status,
                status_text,
                ..
            } => JmapError::transport(Some(status), status_text),
            TransportError::Network(message) => JmapError::transport(None, message),
            TransportError::Setup(message) => JmapError::Settings(message),
        }
    }
}

/// One request/response exchange with the service. Implementations attach the
/// credential to every exchange and never retry.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError>;
    async fn post(&self, url: &str, body: Bytes) -> Result<Bytes, TransportError>;
}

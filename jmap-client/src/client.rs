// JMAP client handle
// Owns the session cache and the batch executor. Domain modules (mail,
// contacts, calendar) each hold a clone of this handle and build their own
// batches on top of it; none of them depends on another.

use crate::calendar::Calendar;
use crate::config::ClientConfig;
use crate::contacts::Contacts;
use crate::executor::BatchExecutor;
use crate::mail::Mail;
use crate::session::{Session, SessionCache};
use jmap_core::{Batch, BatchResponse, Result};
use jmap_transport::{HttpTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct ClientInner {
    sessions: SessionCache,
    executor: BatchExecutor,
}

/// Cheap to clone; clones share the session and the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct JmapClient {
    inner: Arc<ClientInner>,
}

impl JmapClient {
    /// Create a client over HTTP with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(
            config.api_token.clone(),
            Duration::from_millis(config.timeout_ms),
            &config.user_agent,
        )?;
        Ok(Self::with_transport(config.session_url, Arc::new(transport)))
    }

    /// Create a client configured from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn with_transport(session_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                sessions: SessionCache::new(session_url, transport.clone()),
                executor: BatchExecutor::new(transport),
            }),
        }
    }

    pub async fn session(&self) -> Result<Arc<Session>> {
        self.inner.sessions.get().await
    }

    /// Execute a batch against the session's API endpoint.
    pub async fn execute(&self, batch: Batch) -> Result<BatchResponse> {
        let session = self.session().await?;
        self.inner.executor.execute(&session.api_url, batch).await
    }

    pub fn mail(&self) -> Mail {
        Mail::new(self.clone())
    }

    pub fn contacts(&self) -> Contacts {
        Contacts::new(self.clone())
    }

    pub fn calendar(&self) -> Calendar {
        Calendar::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmap_core::JmapError;

    #[test]
    fn test_client_creation() {
        let client = JmapClient::new(ClientConfig::new("https://jmap.example.com/session", "t"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_empty_token() {
        let err = JmapClient::new(ClientConfig::new("https://jmap.example.com/session", ""))
            .unwrap_err();
        assert!(matches!(err, JmapError::Settings(_)));
    }

    #[test]
    fn test_clones_share_session_cache() {
        let client = JmapClient::new(ClientConfig::new("https://jmap.example.com/session", "t"))
            .unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(&client.inner, &clone.inner));
    }
}

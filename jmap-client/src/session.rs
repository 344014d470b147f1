use indexmap::IndexMap;
use jmap_core::{JmapError, Result};
use jmap_transport::Transport;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Account identity and endpoints discovered at bootstrap. Immutable once
/// built.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub api_url: String,
    pub account_id: String,
    /// Server-level capabilities.
    pub capabilities: Map<String, Value>,
    /// Capabilities of the selected account.
    pub account_capabilities: Map<String, Value>,
    pub download_url: Option<String>,
    pub upload_url: Option<String>,
    pub username: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapAccount {
    #[serde(default)]
    account_capabilities: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bootstrap {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    accounts: IndexMap<String, BootstrapAccount>,
    #[serde(default)]
    capabilities: Map<String, Value>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl Session {
    /// Build a session from the bootstrap document.
    ///
    /// The first account listed is selected; accounts are not disambiguated.
    pub fn from_bootstrap(body: &[u8]) -> Result<Self> {
        let bootstrap: Bootstrap = serde_json::from_slice(body)
            .map_err(|e| JmapError::protocol(format!("malformed session document: {}", e)))?;

        let api_url = bootstrap
            .api_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| JmapError::protocol("session document has no apiUrl"))?;

        let (account_id, account) = bootstrap
            .accounts
            .into_iter()
            .next()
            .ok_or_else(|| JmapError::protocol("session document lists no accounts"))?;

        Ok(Session {
            api_url,
            account_id,
            capabilities: bootstrap.capabilities,
            account_capabilities: account.account_capabilities.unwrap_or_default(),
            download_url: bootstrap.download_url,
            upload_url: bootstrap.upload_url,
            username: bootstrap.username,
            state: bootstrap.state,
        })
    }

    /// Whether the selected account can use `capability`. Account-level
    /// capabilities are authoritative when the server lists any.
    pub fn supports(&self, capability: &str) -> bool {
        if self.account_capabilities.is_empty() {
            self.capabilities.contains_key(capability)
        } else {
            self.account_capabilities.contains_key(capability)
        }
    }

    /// Expand the download URL template for a blob.
    pub fn download_url(&self, blob_id: &str, name: &str, mime_type: &str) -> Option<String> {
        let template = self.download_url.as_ref()?;
        Some(
            template
                .replace("{accountId}", &urlencoding::encode(&self.account_id))
                .replace("{blobId}", &urlencoding::encode(blob_id))
                .replace("{name}", &urlencoding::encode(name))
                .replace("{type}", &urlencoding::encode(mime_type)),
        )
    }
}

/// Resolves the session once per cache and hands out the same value after.
///
/// There is no expiry: a session that goes stale is not refreshed for the
/// lifetime of the cache.
#[derive(Debug)]
pub struct SessionCache {
    session_url: String,
    transport: Arc<dyn Transport>,
    cell: OnceCell<Arc<Session>>,
}

impl SessionCache {
    pub fn new(session_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            session_url: session_url.into(),
            transport,
            cell: OnceCell::new(),
        }
    }

    /// The session, fetched on first use. Concurrent first callers share one
    /// bootstrap request; a failed bootstrap leaves the cache empty.
    pub async fn get(&self) -> Result<Arc<Session>> {
        self.cell
            .get_or_try_init(|| async {
                let body = self.transport.get(&self.session_url).await?;
                let session = Session::from_bootstrap(&body)?;
                info!(
                    "JMAP session established for account {} (api: {})",
                    session.account_id, session.api_url
                );
                Ok::<_, JmapError>(Arc::new(session))
            })
            .await
            .cloned()
    }

    pub fn cached(&self) -> Option<Arc<Session>> {
        self.cell.get().cloned()
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }
}

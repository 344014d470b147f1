use jmap_core::{JmapError, Result};
use std::fmt;

pub const DEFAULT_SESSION_URL: &str = "https://api.fastmail.com/jmap/session";

/// Client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Session bootstrap URL
    pub session_url: String,
    /// Bearer token sent with every request
    pub api_token: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("session_url", &self.session_url)
            .field("api_token", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_url: DEFAULT_SESSION_URL.to_string(),
            api_token: String::new(),
            timeout_ms: 30000,
            user_agent: concat!("jmap-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(session_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            session_url: session_url.into(),
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// - `JMAP_API_TOKEN` (or `FASTMAIL_API_TOKEN`): required
    /// - `JMAP_SESSION_URL`: full session URL, or
    /// - `FASTMAIL_BASE_URL`: base URL the session path is appended to
    /// - `JMAP_TIMEOUT_MS`: request timeout
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_token = non_empty("JMAP_API_TOKEN")
            .or_else(|| non_empty("FASTMAIL_API_TOKEN"))
            .ok_or_else(|| {
                JmapError::Settings("JMAP_API_TOKEN (or FASTMAIL_API_TOKEN) is not set".to_string())
            })?;

        let session_url = match (non_empty("JMAP_SESSION_URL"), non_empty("FASTMAIL_BASE_URL")) {
            (Some(url), _) => url,
            (None, Some(base)) => format!("{}/jmap/session", base.trim_end_matches('/')),
            (None, None) => DEFAULT_SESSION_URL.to_string(),
        };

        let mut config = Self::new(session_url, api_token);
        if let Some(timeout) = non_empty("JMAP_TIMEOUT_MS") {
            config.timeout_ms = timeout.trim().parse().map_err(|_| {
                JmapError::Settings(format!("JMAP_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(JmapError::Settings("API token is empty".to_string()));
        }
        if !(self.session_url.starts_with("https://") || self.session_url.starts_with("http://")) {
            return Err(JmapError::Settings(format!(
                "session URL must be http(s): {}",
                self.session_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(JmapError::Settings("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

use crate::{Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// reqwest-backed transport sending the bearer token on every exchange.
pub struct HttpTransport {
    http_client: HttpClient,
    api_token: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    pub fn new(
        api_token: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, TransportError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self {
            http_client,
            api_token: api_token.into(),
        })
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<Bytes, TransportError> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response body: {}", e)))?;

        debug!("HTTP {} ({} bytes)", status.as_u16(), body.len());
        trace!("Response body:\n{}", String::from_utf8_lossy(&body));

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Unauthorized {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        debug!("GET {}", url);
        self.exchange(self.http_client.get(url)).await
    }

    async fn post(&self, url: &str, body: Bytes) -> Result<Bytes, TransportError> {
        debug!("POST {} ({} bytes)", url, body.len());
        trace!("Request body:\n{}", String::from_utf8_lossy(&body));
        self.exchange(
            self.http_client
                .post(url)
                .header("Content-Type", "application/json")
                .body(body),
        )
        .await
    }
}

use jmap_core::{decode_response, encode_request, Batch, BatchResponse, BuildError, Result};
use jmap_transport::Transport;
use std::sync::Arc;
use tracing::debug;

/// Sends one batch per call: encode, one POST, decode, match against the
/// submitted labels. Never retries.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    transport: Arc<dyn Transport>,
}

impl BatchExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn execute(&self, api_url: &str, batch: Batch) -> Result<BatchResponse> {
        if batch.is_empty() {
            return Err(BuildError::EmptyBatch.into());
        }

        let body = encode_request(&batch)?;
        debug!(
            "Sending batch to {}: {} steps {:?}",
            api_url,
            batch.len(),
            batch.labels()
        );

        let raw = self.transport.post(api_url, body).await?;
        let wire = decode_response(&raw)?;
        let response = BatchResponse::from_wire(&batch, wire)?;

        debug!("Received {} step results", response.len());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use jmap_core::{Arguments, JmapError};
    use jmap_transport::TransportError;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Answers every POST with a fixed body and records what was sent.
    #[derive(Debug)]
    struct CannedTransport {
        reply: String,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl CannedTransport {
        fn new(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn get(&self, _url: &str) -> std::result::Result<Bytes, TransportError> {
            Err(TransportError::Network("not used".to_string()))
        }

        async fn post(&self, url: &str, body: Bytes) -> std::result::Result<Bytes, TransportError> {
            let body: Value = serde_json::from_slice(&body)
                .map_err(|e| TransportError::Network(e.to_string()))?;
            self.sent.lock().unwrap().push((url.to_string(), body));
            Ok(Bytes::from(self.reply.clone()))
        }
    }

    fn two_step_batch() -> Batch {
        let mut batch = Batch::with_capabilities(["urn:ietf:params:jmap:mail"]);
        let query = batch
            .call("query", "Email/query", Arguments::new().set("accountId", "A1"))
            .unwrap();
        batch
            .call(
                "get",
                "Email/get",
                Arguments::new()
                    .set("accountId", "A1")
                    .reference("ids", query.result("/ids")),
            )
            .unwrap();
        batch
    }

    #[tokio::test]
    async fn test_whole_batch_is_one_post() {
        let transport = CannedTransport::new(json!({"methodResponses": [
            ["Email/query", {"ids": ["M1"]}, "query"],
            ["Email/get", {"list": [{"id": "M1"}]}, "get"]
        ]}));
        let executor = BatchExecutor::new(transport.clone());

        let response = executor
            .execute("https://jmap.example.com/api", two_step_batch())
            .await
            .unwrap();
        assert_eq!(response.labels(), vec!["query", "get"]);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://jmap.example.com/api");
        assert_eq!(sent[0].1["methodCalls"][1][1]["#ids"]["resultOf"], "query");
    }

    #[tokio::test]
    async fn test_mislabelled_response_is_protocol_error() {
        let transport = CannedTransport::new(json!({"methodResponses": [
            ["Email/query", {"ids": []}, "query"],
            ["Email/get", {"list": []}, "other"]
        ]}));
        let err = BatchExecutor::new(transport)
            .execute("https://jmap.example.com/api", two_step_batch())
            .await
            .unwrap_err();
        assert!(matches!(err, JmapError::Protocol(ref m) if m.contains("'other'")));
    }

    #[tokio::test]
    async fn test_non_json_body_is_protocol_error() {
        let transport = Arc::new(CannedTransport {
            reply: "<html>oops</html>".to_string(),
            sent: Mutex::new(Vec::new()),
        });
        let err = BatchExecutor::new(transport)
            .execute("https://jmap.example.com/api", two_step_batch())
            .await
            .unwrap_err();
        assert!(matches!(err, JmapError::Protocol(_)));
    }
}

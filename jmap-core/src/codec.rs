use crate::batch::{Batch, BatchStep};
use crate::capability::CapabilitySet;
use crate::error::{JmapError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request envelope: `{"using": [...], "methodCalls": [[name, args, label], ...]}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest<'a> {
    pub using: &'a CapabilitySet,
    pub method_calls: &'a [BatchStep],
}

impl<'a> From<&'a Batch> for WireRequest<'a> {
    fn from(batch: &'a Batch) -> Self {
        WireRequest {
            using: batch.capabilities(),
            method_calls: batch.steps(),
        }
    }
}

/// One `[name, payload, label]` entry of `methodResponses`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodResponse(pub String, pub Value, pub String);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    pub method_responses: Vec<MethodResponse>,
    #[serde(default)]
    pub session_state: Option<String>,
    #[serde(default)]
    pub created_ids: Option<Map<String, Value>>,
}

pub fn encode_request(batch: &Batch) -> Result<Bytes> {
    let json = serde_json::to_vec(&WireRequest::from(batch))
        .map_err(|e| JmapError::Serialization(e.to_string()))?;
    Ok(Bytes::from(json))
}

/// Parse a response body. Anything that is not a well-formed response
/// envelope, including a truncated body, is a protocol error.
pub fn decode_response(data: &[u8]) -> Result<WireResponse> {
    serde_json::from_slice(data)
        .map_err(|e| JmapError::protocol(format!("malformed response body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Arguments;
    use crate::capability::MAIL;
    use serde_json::json;

    #[test]
    fn test_encode_request_envelope() {
        let mut batch = Batch::with_capabilities([MAIL]);
        let query = batch
            .call("q", "Email/query", Arguments::new().set("accountId", "A1"))
            .unwrap();
        batch
            .call(
                "g",
                "Email/get",
                Arguments::new()
                    .set("accountId", "A1")
                    .reference("ids", query.result("/ids")),
            )
            .unwrap();

        let bytes = encode_request(&batch).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "using": ["urn:ietf:params:jmap:core", "urn:ietf:params:jmap:mail"],
                "methodCalls": [
                    ["Email/query", {"accountId": "A1"}, "q"],
                    ["Email/get", {
                        "accountId": "A1",
                        "#ids": {"resultOf": "q", "name": "Email/query", "path": "/ids"}
                    }, "g"]
                ]
            })
        );
    }

    #[test]
    fn test_decode_response() {
        let body = br#"{
            "methodResponses": [
                ["Email/query", {"ids": ["a", "b"]}, "q"],
                ["error", {"type": "unknownMethod"}, "g"]
            ],
            "sessionState": "s1"
        }"#;
        let response = decode_response(body).unwrap();
        assert_eq!(response.method_responses.len(), 2);
        assert_eq!(response.method_responses[1].0, "error");
        assert_eq!(response.method_responses[1].2, "g");
        assert_eq!(response.session_state.as_deref(), Some("s1"));
    }

    #[test]
    fn test_decode_truncated_body_is_protocol_error() {
        let body = br#"{"methodResponses": [["Email/query", {"ids": ["a""#;
        let err = decode_response(body).unwrap_err();
        assert!(matches!(err, JmapError::Protocol(_)));
    }

    #[test]
    fn test_decode_wrong_shape_is_protocol_error() {
        let body = br#"{"methodResponses": [["Email/query", {}]]}"#;
        assert!(matches!(decode_response(body), Err(JmapError::Protocol(_))));

        let body = br#"{"unexpected": true}"#;
        assert!(matches!(decode_response(body), Err(JmapError::Protocol(_))));
    }
}

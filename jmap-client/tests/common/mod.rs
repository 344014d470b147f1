#![allow(dead_code)]

use jmap_client::{ClientConfig, JmapClient};
use jmap_core::capability::{CORE, MAIL, SUBMISSION};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Map, Value};

pub const TOKEN: &str = "test-token";
pub const ACCOUNT: &str = "A1";

pub const MAIL_CAPABILITIES: &[&str] = &[CORE, MAIL, SUBMISSION];

pub fn session_body(server: &ServerGuard, capabilities: &[&str]) -> String {
    let caps: Map<String, Value> = capabilities
        .iter()
        .map(|c| (c.to_string(), json!({})))
        .collect();
    json!({
        "capabilities": caps,
        "accounts": {
            ACCOUNT: {"name": "user@example.com", "accountCapabilities": caps}
        },
        "apiUrl": format!("{}/api", server.url()),
        "downloadUrl": format!(
            "{}/download/{{accountId}}/{{blobId}}/{{name}}?type={{type}}",
            server.url()
        ),
        "username": "user@example.com",
        "state": "s0"
    })
    .to_string()
}

/// Session document served exactly once.
pub async fn mock_session(server: &mut ServerGuard, capabilities: &[&str]) -> Mock {
    let body = session_body(server, capabilities);
    server
        .mock("GET", "/session")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

/// API response for batches whose body matches `pattern`.
pub async fn mock_api(
    server: &mut ServerGuard,
    pattern: &str,
    responses: Value,
    hits: usize,
) -> Mock {
    server
        .mock("POST", "/api")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .match_body(Matcher::Regex(pattern.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(method_responses(responses))
        .expect(hits)
        .create_async()
        .await
}

pub fn method_responses(responses: Value) -> String {
    json!({"methodResponses": responses, "sessionState": "s1"}).to_string()
}

pub fn client_for(server: &ServerGuard) -> JmapClient {
    jmap_client::logging::init_test_logging();
    JmapClient::new(ClientConfig::new(format!("{}/session", server.url()), TOKEN))
        .expect("client config is valid")
}

pub fn mailboxes() -> Value {
    json!([
        {"id": "INBOX", "name": "Inbox", "role": "inbox", "totalEmails": 10, "unreadEmails": 2},
        {"id": "DRAFTS", "name": "Drafts", "role": "drafts"},
        {"id": "SENT", "name": "Sent Items", "role": "sent"},
        {"id": "TRASH", "name": "Trash", "role": "trash", "totalEmails": 3}
    ])
}

pub fn identities() -> Value {
    json!([
        {"id": "ID1", "name": "Me", "email": "me@example.com"},
        {"id": "ID2", "name": "", "email": "*@example.org"}
    ])
}

use chrono::{DateTime, SecondsFormat, Utc};
use jmap_core::{Container, JmapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(default)]
    pub total_emails: u64,
    #[serde(default)]
    pub unread_emails: u64,
    #[serde(default)]
    pub total_threads: u64,
    #[serde(default)]
    pub unread_threads: u64,
}

impl Container for Mailbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub blob_id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyValue {
    pub value: String,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub is_encoding_problem: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub mailbox_ids: BTreeMap<String, bool>,
    #[serde(default)]
    pub keywords: BTreeMap<String, bool>,
    #[serde(default)]
    pub from: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub to: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub cc: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub reply_to: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub text_body: Option<Vec<BodyPart>>,
    #[serde(default)]
    pub html_body: Option<Vec<BodyPart>>,
    #[serde(default)]
    pub attachments: Option<Vec<BodyPart>>,
    #[serde(default)]
    pub body_values: BTreeMap<String, BodyValue>,
}

impl Email {
    pub fn is_unread(&self) -> bool {
        !self.keywords.get("$seen").copied().unwrap_or(false)
    }

    pub fn is_flagged(&self) -> bool {
        self.keywords.get("$flagged").copied().unwrap_or(false)
    }

    /// Concatenated plain-text body values, when they were fetched.
    pub fn text(&self) -> Option<String> {
        let parts = self.text_body.as_ref()?;
        let text: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.part_id.as_ref())
            .filter_map(|id| self.body_values.get(id))
            .map(|value| value.value.as_str())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join("\n"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub reply_to: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub may_delete: bool,
}

impl Identity {
    /// Exact address match, ignoring case. A `*@domain` identity matches any
    /// address at that domain.
    pub fn matches(&self, address: &str) -> bool {
        let address = address.trim().to_lowercase();
        let own = self.email.to_lowercase();
        match own.strip_prefix("*@") {
            Some(domain) => address
                .rsplit_once('@')
                .is_some_and(|(_, d)| d == domain),
            None => own == address,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.email.starts_with("*@")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub email_ids: Vec<String>,
}

/// Parameters of an outgoing message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SendEmail {
    /// Sender; must match a sending identity. Defaults to the first identity.
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
}

impl SendEmail {
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(JmapError::InvalidInput("at least one recipient is required".to_string()));
        }
        if self.text_body.is_none() && self.html_body.is_none() {
            return Err(JmapError::InvalidInput("a text or HTML body is required".to_string()));
        }
        Ok(())
    }

    /// Email object for `Email/set` create, filed in `mailbox_id` as a draft.
    pub(crate) fn to_email_object(&self, mailbox_id: &str, from: &EmailAddress) -> Result<Value> {
        self.validate()?;

        let addresses = |list: &[String]| -> Value {
            Value::Array(list.iter().map(|a| json!({"email": a})).collect())
        };

        let mut object = Map::new();
        object.insert("mailboxIds".to_string(), json!({ mailbox_id: true }));
        object.insert("keywords".to_string(), json!({"$draft": true, "$seen": true}));
        object.insert("from".to_string(), json!([from]));
        object.insert("to".to_string(), addresses(&self.to));
        if !self.cc.is_empty() {
            object.insert("cc".to_string(), addresses(&self.cc));
        }
        if !self.bcc.is_empty() {
            object.insert("bcc".to_string(), addresses(&self.bcc));
        }
        object.insert("subject".to_string(), json!(self.subject));

        let mut body_values = Map::new();
        if let Some(text) = &self.text_body {
            object.insert(
                "textBody".to_string(),
                json!([{"partId": "text", "type": "text/plain"}]),
            );
            body_values.insert("text".to_string(), json!({"value": text}));
        }
        if let Some(html) = &self.html_body {
            object.insert("htmlBody".to_string(), json!([{"partId": "html", "type": "text/html"}]));
            body_values.insert("html".to_string(), json!({"value": html}));
        }
        object.insert("bodyValues".to_string(), Value::Object(body_values));

        Ok(Value::Object(object))
    }
}

/// Structured search over the standard `Email/query` filter conditions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilter {
    pub text: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub has_attachment: Option<bool>,
    pub is_unread: Option<bool>,
    pub mailbox_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn to_filter(&self) -> Value {
        let mut filter = Map::new();
        let mut put = |key: &str, value: Value| {
            filter.insert(key.to_string(), value);
        };
        if let Some(text) = &self.text {
            put("text", json!(text));
        }
        if let Some(from) = &self.from {
            put("from", json!(from));
        }
        if let Some(to) = &self.to {
            put("to", json!(to));
        }
        if let Some(subject) = &self.subject {
            put("subject", json!(subject));
        }
        if let Some(has_attachment) = self.has_attachment {
            put("hasAttachment", json!(has_attachment));
        }
        match self.is_unread {
            Some(true) => put("notKeyword", json!("$seen")),
            Some(false) => put("hasKeyword", json!("$seen")),
            None => {}
        }
        if let Some(mailbox_id) = &self.mailbox_id {
            put("inMailbox", json!(mailbox_id));
        }
        if let Some(after) = &self.after {
            put("after", json!(after.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(before) = &self.before {
            put("before", json!(before.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        Value::Object(filter)
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub email_id: String,
    pub submission_id: String,
    /// Whether the server confirmed moving the message out of drafts into
    /// the sent mailbox.
    pub moved_to_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account_id: String,
    pub username: Option<String>,
    pub mailbox_count: usize,
    pub total_emails: u64,
    pub unread_emails: u64,
    pub identity_count: usize,
    pub capabilities: Vec<String>,
}

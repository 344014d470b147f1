use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which rejection collection of a method response an id was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionKind {
    NotFound,
    NotCreated,
    NotUpdated,
    NotDestroyed,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionKind::NotFound => "notFound",
            RejectionKind::NotCreated => "notCreated",
            RejectionKind::NotUpdated => "notUpdated",
            RejectionKind::NotDestroyed => "notDestroyed",
        };
        write!(f, "{}", s)
    }
}

/// Reason the server gave for refusing one record-level effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
}

impl SetError {
    pub fn new(kind: impl Into<String>) -> Self {
        SetError {
            kind: kind.into(),
            description: None,
            properties: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new("notFound")
    }
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({})", self.kind, description),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// The server processed the batch but refused some record-level effects.
///
/// `failures` holds exactly the ids the caller targeted that were refused, with
/// the reason codes copied verbatim from the response. `context` carries ids of
/// effects that did happen before the refusal (for example a created draft
/// whose submission was rejected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub label: String,
    pub method: String,
    pub kind: RejectionKind,
    pub failures: BTreeMap<String, SetError>,
    pub context: BTreeMap<String, String>,
}

impl Rejection {
    pub fn new(
        label: impl Into<String>,
        method: impl Into<String>,
        kind: RejectionKind,
        failures: BTreeMap<String, SetError>,
    ) -> Self {
        Rejection {
            label: label.into(),
            method: method.into(),
            kind,
            failures,
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.keys().map(String::as_str).collect()
    }

    pub fn reason(&self, id: &str) -> Option<&SetError> {
        self.failures.get(id)
    }

    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' {}:", self.method, self.label, self.kind)?;
        for (id, reason) in &self.failures {
            write!(f, " {}={}", id, reason)?;
        }
        if !self.context.is_empty() {
            write!(f, " [")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Method-level error response (`["error", {...}, label]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodError {
    pub label: String,
    pub kind: String,
    pub description: Option<String>,
}

impl MethodError {
    /// Error types meaning the account cannot serve this method family at all,
    /// as opposed to a failure on a particular record.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.kind.as_str(),
            "unknownMethod"
                | "unknownCapability"
                | "accountNotSupportedByMethod"
                | "accountNotFound"
                | "forbidden"
        )
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method error in step '{}': {}", self.label, self.kind)?;
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}

/// Batch assembly mistakes. These are caller bugs, reported before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("duplicate step label '{0}'")]
    DuplicateLabel(String),
    #[error("step '{label}' references '{target}', which is not an earlier step of the batch")]
    UnknownStep { label: String, target: String },
    #[error("step '{label}' references '{target}' as {expected}, but that step calls {actual}")]
    MethodMismatch {
        label: String,
        target: String,
        expected: String,
        actual: String,
    },
    #[error("arguments for step '{0}' must be a JSON object")]
    NotAnObject(String),
    #[error("batch has no steps")]
    EmptyBatch,
}

#[derive(Debug, Error)]
pub enum JmapError {
    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("transport error{}: {status_text}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        status_text: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("rejected: {0}")]
    Rejection(Box<Rejection>),

    #[error("required container not found (role '{role}', name containing '{name}')")]
    Configuration { role: String, name: String },

    #[error("{0}")]
    Method(MethodError),

    #[error("invalid batch: {0}")]
    Build(#[from] BuildError),

    #[error("no supported strategy for {operation} (tried: {})", .tried.join(", "))]
    Unsupported {
        operation: String,
        tried: Vec<String>,
    },

    #[error("'{address}' does not match any sending identity")]
    Identity { address: String },

    #[error("invalid client settings: {0}")]
    Settings(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, JmapError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl JmapError {
    pub fn protocol(message: impl Into<String>) -> Self {
        JmapError::Protocol(message.into())
    }

    pub fn transport(status: Option<u16>, status_text: impl Into<String>) -> Self {
        JmapError::Transport {
            status,
            status_text: status_text.into(),
        }
    }

    pub fn configuration(role: impl Into<String>, name: impl Into<String>) -> Self {
        JmapError::Configuration {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn rejection(rejection: Rejection) -> Self {
        JmapError::Rejection(Box::new(rejection))
    }

    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            JmapError::Rejection(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn as_method_error(&self) -> Option<&MethodError> {
        match self {
            JmapError::Method(err) => Some(err),
            _ => None,
        }
    }

    /// Only record-level rejections are worth a second attempt with corrected
    /// input. Everything else is fatal for the operation.
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(self, JmapError::Rejection(_))
    }
}

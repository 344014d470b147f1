// Standard method response shapes (RFC 8620 §5).

use crate::error::{RejectionKind, SetError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Servers send `null` for empty collections as often as they omit them.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `Foo/get` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct GetResponse<T = Value> {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_found: Vec<String>,
}

/// `Foo/query` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub query_state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ids: Vec<String>,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// `Foo/set` response.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetResponse {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub new_state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub destroyed: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_created: BTreeMap<String, SetError>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_updated: BTreeMap<String, SetError>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_destroyed: BTreeMap<String, SetError>,
}

impl SetResponse {
    pub fn rejection_set(&self, kind: RejectionKind) -> Option<&BTreeMap<String, SetError>> {
        match kind {
            RejectionKind::NotCreated => Some(&self.not_created),
            RejectionKind::NotUpdated => Some(&self.not_updated),
            RejectionKind::NotDestroyed => Some(&self.not_destroyed),
            RejectionKind::NotFound => None,
        }
    }

    /// Entries of the `kind` rejection set that belong to `ids`.
    pub fn failures_for<S: AsRef<str>>(
        &self,
        kind: RejectionKind,
        ids: &[S],
    ) -> BTreeMap<String, SetError> {
        let Some(set) = self.rejection_set(kind) else {
            return BTreeMap::new();
        };
        ids.iter()
            .filter_map(|id| {
                let id = id.as_ref();
                set.get(id).map(|reason| (id.to_string(), reason.clone()))
            })
            .collect()
    }

    /// Server id of the object created under `creation_id`.
    pub fn created_id(&self, creation_id: &str) -> Option<&str> {
        self.created
            .get(creation_id)
            .and_then(|created| created.get("id"))
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_response_nulls() {
        let response: SetResponse = serde_json::from_value(json!({
            "accountId": "A1",
            "newState": "2",
            "created": null,
            "updated": {"M1": null},
            "destroyed": null,
            "notCreated": null,
            "notUpdated": {"M2": {"type": "notFound"}},
            "notDestroyed": null
        }))
        .unwrap();
        assert!(response.created.is_empty());
        assert!(response.updated.contains_key("M1"));
        assert_eq!(response.not_updated["M2"].kind, "notFound");
    }

    #[test]
    fn test_failures_for_only_targeted_ids() {
        let response: SetResponse = serde_json::from_value(json!({
            "notUpdated": {
                "B": {"type": "forbidden"},
                "Z": {"type": "notFound"}
            }
        }))
        .unwrap();
        let failures = response.failures_for(RejectionKind::NotUpdated, &["A", "B", "C"]);
        assert_eq!(failures.keys().collect::<Vec<_>>(), vec!["B"]);
        assert!(response.failures_for(RejectionKind::NotFound, &["B"]).is_empty());
    }

    #[test]
    fn test_created_id() {
        let response: SetResponse = serde_json::from_value(json!({
            "created": {"draft": {"id": "M9", "blobId": "B9"}}
        }))
        .unwrap();
        assert_eq!(response.created_id("draft"), Some("M9"));
        assert_eq!(response.created_id("other"), None);
    }

    #[test]
    fn test_get_response_defaults() {
        let response: GetResponse = serde_json::from_value(json!({"list": null})).unwrap();
        assert!(response.list.is_empty());
        assert!(response.not_found.is_empty());

        let response: QueryResponse =
            serde_json::from_value(json!({"ids": ["a"], "total": 3})).unwrap();
        assert_eq!(response.ids, vec!["a"]);
        assert_eq!(response.total, Some(3));
    }
}

// Result resolution
// Turns a positional batch response into the values a caller asked for.
// Transport and protocol problems never reach this point; what is left is
// telling a successful step apart from a step that reports record-level
// refusals, and a method that failed outright.

use crate::envelope::{GetResponse, QueryResponse, SetResponse};
use crate::error::{JmapError, MethodError, Rejection, RejectionKind, Result, SetError};
use crate::response::{BatchResponse, StepResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: Option<String>,
}

fn method_error(step: &StepResult) -> JmapError {
    let payload = ErrorPayload::deserialize(&step.payload).unwrap_or(ErrorPayload {
        kind: "serverFail".to_string(),
        description: Some(step.payload.to_string()),
    });
    JmapError::Method(MethodError {
        label: step.label.clone(),
        kind: payload.kind,
        description: payload.description,
    })
}

fn pointer(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

impl BatchResponse {
    /// The step labelled `label`. An absent label means the batch and the
    /// response disagree, which is a protocol error.
    pub fn step(&self, label: &str) -> Result<&StepResult> {
        self.steps()
            .iter()
            .find(|step| step.label == label)
            .ok_or_else(|| JmapError::protocol(format!("no response for step '{}'", label)))
    }

    /// Payload of a successful step. A method-level `error` response becomes
    /// [`JmapError::Method`].
    pub fn payload(&self, label: &str) -> Result<&Value> {
        let step = self.step(label)?;
        if step.is_error() {
            return Err(method_error(step));
        }
        Ok(&step.payload)
    }

    /// Payload of `label`, projected to `path` (a JSON pointer; the leading
    /// slash may be omitted). A path that does not exist yields `Null`.
    pub fn resolve(&self, label: &str, path: Option<&str>) -> Result<Value> {
        let payload = self.payload(label)?;
        match path {
            None => Ok(payload.clone()),
            Some(path) => Ok(payload.pointer(&pointer(path)).cloned().unwrap_or(Value::Null)),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, label: &str) -> Result<T> {
        let step = self.step(label)?;
        let payload = self.payload(label)?;
        T::deserialize(payload).map_err(|e| {
            JmapError::protocol(format!(
                "unexpected {} payload in step '{}': {}",
                step.method, label, e
            ))
        })
    }

    pub fn get_response<T: DeserializeOwned>(&self, label: &str) -> Result<GetResponse<T>> {
        self.decode(label)
    }

    pub fn query_response(&self, label: &str) -> Result<QueryResponse> {
        self.decode(label)
    }

    pub fn set_response(&self, label: &str) -> Result<SetResponse> {
        self.decode(label)
    }

    /// The `list` of a `/get` step, in the order the server returned it.
    pub fn list<T: DeserializeOwned>(&self, label: &str) -> Result<Vec<T>> {
        Ok(self.get_response(label)?.list)
    }

    /// The `list` of a `/get` step fed by a `/query` step. A failed query is
    /// reported as itself, not as the get step's broken reference.
    pub fn query_list<T: DeserializeOwned>(&self, query: &str, get: &str) -> Result<Vec<T>> {
        self.payload(query)?;
        self.list(get)
    }

    /// Fail with a `notFound` rejection if any of `ids` is in the step's
    /// `notFound` set.
    pub fn ensure_found<S: AsRef<str>>(&self, label: &str, ids: &[S]) -> Result<()> {
        let step = self.step(label)?;
        let response: GetResponse<Value> = self.get_response(label)?;
        let failures: BTreeMap<String, SetError> = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| response.not_found.iter().any(|missing| missing == *id))
            .map(|id| (id.to_string(), SetError::not_found()))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(JmapError::rejection(Rejection::new(
                label,
                &step.method,
                RejectionKind::NotFound,
                failures,
            )))
        }
    }

    /// Fetch the record `id` from a `/get` step. A record listed in
    /// `notFound`, or missing from `list`, is a `notFound` rejection.
    pub fn get_one<T: DeserializeOwned>(&self, label: &str, id: &str) -> Result<T> {
        let step = self.step(label)?;
        let response: GetResponse<Value> = self.get_response(label)?;
        let record = response
            .list
            .into_iter()
            .find(|record| record.get("id").and_then(Value::as_str) == Some(id));
        let Some(record) = record else {
            let mut failures = BTreeMap::new();
            failures.insert(id.to_string(), SetError::not_found());
            return Err(JmapError::rejection(Rejection::new(
                label,
                &step.method,
                RejectionKind::NotFound,
                failures,
            )));
        };
        T::deserialize(record).map_err(|e| {
            JmapError::protocol(format!(
                "unexpected {} record in step '{}': {}",
                step.method, label, e
            ))
        })
    }

    /// The record created under `creation_id`, or a `notCreated` rejection.
    pub fn ensure_created(&self, label: &str, creation_id: &str) -> Result<Value> {
        let step = self.step(label)?;
        let response = self.set_response(label)?;
        check_set(&response, label, &step.method, RejectionKind::NotCreated, &[creation_id])?;
        response.created.get(creation_id).cloned().ok_or_else(|| {
            JmapError::protocol(format!(
                "step '{}' neither created nor rejected '{}'",
                label, creation_id
            ))
        })
    }

    /// Fail with a rejection naming exactly the ids of `ids` the step did not
    /// update. Ids updated successfully are not mentioned.
    pub fn ensure_updated<S: AsRef<str>>(&self, label: &str, ids: &[S]) -> Result<SetResponse> {
        let step = self.step(label)?;
        let response = self.set_response(label)?;
        check_set(&response, label, &step.method, RejectionKind::NotUpdated, ids)?;
        Ok(response)
    }

    pub fn ensure_destroyed<S: AsRef<str>>(&self, label: &str, ids: &[S]) -> Result<SetResponse> {
        let step = self.step(label)?;
        let response = self.set_response(label)?;
        check_set(&response, label, &step.method, RejectionKind::NotDestroyed, ids)?;
        Ok(response)
    }

    /// Implicit `/set` response attached to `label`, if the server sent one.
    pub fn implicit_set(&self, label: &str, method: &str) -> Result<Option<SetResponse>> {
        let step = self.step(label)?;
        step.implicit_response(method)
            .map(|payload| {
                SetResponse::deserialize(payload).map_err(|e| {
                    JmapError::protocol(format!(
                        "unexpected implicit {} payload in step '{}': {}",
                        method, label, e
                    ))
                })
            })
            .transpose()
    }
}

/// Raise a rejection for the targeted ids found in the `kind` set.
pub fn check_set<S: AsRef<str>>(
    response: &SetResponse,
    label: &str,
    method: &str,
    kind: RejectionKind,
    ids: &[S],
) -> Result<()> {
    let failures = response.failures_for(kind, ids);
    if failures.is_empty() {
        Ok(())
    } else {
        Err(JmapError::rejection(Rejection::new(label, method, kind, failures)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_response;
    use serde_json::json;

    fn response(labels: &[&str], body: Value) -> BatchResponse {
        let wire = decode_response(body.to_string().as_bytes()).unwrap();
        BatchResponse::match_labels(labels, wire).unwrap()
    }

    #[test]
    fn test_resolve_path() {
        let r = response(
            &["q"],
            json!({"methodResponses": [["Email/query", {"ids": ["a", "b"]}, "q"]]}),
        );
        assert_eq!(r.resolve("q", Some("/ids")).unwrap(), json!(["a", "b"]));
        assert_eq!(r.resolve("q", Some("ids")).unwrap(), json!(["a", "b"]));
        assert_eq!(r.resolve("q", Some("/total")).unwrap(), Value::Null);
        assert_eq!(r.resolve("q", None).unwrap()["ids"][1], "b");
    }

    #[test]
    fn test_absent_label_is_protocol_error() {
        let r = response(&["q"], json!({"methodResponses": [["Email/query", {}, "q"]]}));
        assert!(matches!(r.resolve("g", None), Err(JmapError::Protocol(_))));
    }

    #[test]
    fn test_method_error_surfaces() {
        let r = response(
            &["q"],
            json!({"methodResponses": [
                ["error", {"type": "unknownMethod", "description": "nope"}, "q"]
            ]}),
        );
        let err = r.resolve("q", None).unwrap_err();
        let method = err.as_method_error().unwrap();
        assert_eq!(method.kind, "unknownMethod");
        assert!(method.is_unsupported());
        assert_eq!(method.description.as_deref(), Some("nope"));
    }

    #[test]
    fn test_single_update_rejection_carries_reason() {
        let r = response(
            &["update"],
            json!({"methodResponses": [["Email/set", {
                "notUpdated": {"M1": {"type": "notFound", "description": "gone"}}
            }, "update"]]}),
        );
        let err = r.ensure_updated("update", &["M1"]).unwrap_err();
        let rejection = err.as_rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::NotUpdated);
        assert_eq!(rejection.failed_ids(), vec!["M1"]);
        assert_eq!(rejection.reason("M1").unwrap().kind, "notFound");
        assert_eq!(rejection.reason("M1").unwrap().description.as_deref(), Some("gone"));
    }

    #[test]
    fn test_bulk_update_rejects_only_failed_ids() {
        let r = response(
            &["update"],
            json!({"methodResponses": [["Email/set", {
                "updated": {"A": null, "C": null},
                "notUpdated": {"B": {"type": "forbidden"}}
            }, "update"]]}),
        );
        let err = r.ensure_updated("update", &["A", "B", "C"]).unwrap_err();
        assert_eq!(err.as_rejection().unwrap().failed_ids(), vec!["B"]);
    }

    #[test]
    fn test_update_success() {
        let r = response(
            &["update"],
            json!({"methodResponses": [["Email/set", {"updated": {"A": null}}, "update"]]}),
        );
        let set = r.ensure_updated("update", &["A"]).unwrap();
        assert!(set.updated.contains_key("A"));
    }

    #[test]
    fn test_ensure_created() {
        let r = response(
            &["c"],
            json!({"methodResponses": [["CalendarEvent/set", {
                "created": {"event": {"id": "E1"}}
            }, "c"]]}),
        );
        assert_eq!(r.ensure_created("c", "event").unwrap()["id"], "E1");

        let r = response(
            &["c"],
            json!({"methodResponses": [["CalendarEvent/set", {
                "notCreated": {"event": {"type": "invalidProperties", "properties": ["start"]}}
            }, "c"]]}),
        );
        let err = r.ensure_created("c", "event").unwrap_err();
        let rejection = err.as_rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::NotCreated);
        assert_eq!(rejection.reason("event").unwrap().kind, "invalidProperties");
    }

    #[test]
    fn test_get_one_not_found() {
        let r = response(
            &["g"],
            json!({"methodResponses": [["Email/get", {"list": [], "notFound": ["M404"]}, "g"]]}),
        );
        let err = r.get_one::<Value>("g", "M404").unwrap_err();
        let rejection = err.as_rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::NotFound);
        assert_eq!(rejection.failed_ids(), vec!["M404"]);
        assert!(r.ensure_found("g", &["M404"]).is_err());
        assert!(r.ensure_found("g", &["M1"]).is_ok());
    }

    #[test]
    fn test_get_one_picks_requested_id() {
        let r = response(
            &["g"],
            json!({"methodResponses": [["Email/get", {
                "list": [{"id": "M2"}, {"id": "M1", "subject": "hi"}],
                "notFound": []
            }, "g"]]}),
        );
        let record: Value = r.get_one("g", "M1").unwrap();
        assert_eq!(record["subject"], "hi");

        let err = r.get_one::<Value>("g", "M3").unwrap_err();
        let rejection = err.as_rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::NotFound);
        assert_eq!(rejection.failed_ids(), vec!["M3"]);
    }

    #[test]
    fn test_query_list_reports_failed_query() {
        let r = response(
            &["query", "get"],
            json!({"methodResponses": [
                ["error", {"type": "unsupportedFilter"}, "query"],
                ["error", {"type": "invalidResultReference"}, "get"]
            ]}),
        );
        let err = r.query_list::<Value>("query", "get").unwrap_err();
        let method = err.as_method_error().unwrap();
        assert_eq!(method.label, "query");
        assert_eq!(method.kind, "unsupportedFilter");
    }

    #[test]
    fn test_list_keeps_server_order() {
        let r = response(
            &["g"],
            json!({"methodResponses": [["Email/get", {"list": [{"id": "b"}, {"id": "a"}]}, "g"]]}),
        );
        let list: Vec<Value> = r.list("g").unwrap();
        assert_eq!(list[0]["id"], "b");
        assert_eq!(list[1]["id"], "a");
    }

    #[test]
    fn test_wrong_payload_shape_is_protocol_error() {
        let r = response(
            &["s"],
            json!({"methodResponses": [["Email/set", {"notUpdated": ["not", "a", "map"]}, "s"]]}),
        );
        assert!(matches!(r.ensure_updated("s", &["A"]), Err(JmapError::Protocol(_))));
    }
}

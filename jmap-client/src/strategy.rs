// Candidate strategies
// Some services expose the same feature through more than one method family
// (an IETF namespace and an older vendor namespace). Each family is a
// candidate; candidates are tried in order. A candidate is skipped only when
// the account cannot serve it at all. A failure on the record itself stops the
// search and is returned as is.

use crate::session::Session;
use jmap_core::{JmapError, Result};
use std::future::Future;
use tracing::debug;

pub trait Candidate: Copy {
    fn name(&self) -> &'static str;
    fn capability(&self) -> &'static str;
}

pub async fn first_supported<C, T, F, Fut>(
    operation: &str,
    session: &Session,
    candidates: &[C],
    mut attempt: F,
) -> Result<T>
where
    C: Candidate,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tried = Vec::with_capacity(candidates.len());

    for &candidate in candidates {
        tried.push(candidate.name().to_string());

        if !session.supports(candidate.capability()) {
            debug!(
                "{}: skipping {} (account lacks {})",
                operation,
                candidate.name(),
                candidate.capability()
            );
            continue;
        }

        match attempt(candidate).await {
            Err(JmapError::Method(err)) if err.is_unsupported() => {
                debug!("{}: {} unsupported ({})", operation, candidate.name(), err.kind);
            }
            outcome => return outcome,
        }
    }

    Err(JmapError::Unsupported {
        operation: operation.to_string(),
        tried,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmap_core::{MethodError, Rejection, RejectionKind, SetError};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Api {
        New,
        Old,
    }

    impl Candidate for Api {
        fn name(&self) -> &'static str {
            match self {
                Api::New => "new",
                Api::Old => "old",
            }
        }

        fn capability(&self) -> &'static str {
            match self {
                Api::New => "urn:new",
                Api::Old => "urn:old",
            }
        }
    }

    fn session(capabilities: &[&str]) -> Session {
        let caps: serde_json::Map<String, serde_json::Value> =
            capabilities.iter().map(|c| (c.to_string(), json!({}))).collect();
        Session {
            api_url: "https://x/api".to_string(),
            account_id: "A1".to_string(),
            capabilities: caps,
            account_capabilities: Default::default(),
            download_url: None,
            upload_url: None,
            username: None,
            state: None,
        }
    }

    fn unsupported() -> JmapError {
        JmapError::Method(MethodError {
            label: "q".to_string(),
            kind: "unknownMethod".to_string(),
            description: None,
        })
    }

    #[tokio::test]
    async fn test_falls_through_unsupported_method() {
        let calls = RefCell::new(Vec::new());
        let account = session(&["urn:new", "urn:old"]);
        let result = first_supported("op", &account, &[Api::New, Api::Old], |api| {
            calls.borrow_mut().push(api);
            async move {
                match api {
                    Api::New => Err(unsupported()),
                    Api::Old => Ok("old result"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "old result");
        assert_eq!(*calls.borrow(), vec![Api::New, Api::Old]);
    }

    #[tokio::test]
    async fn test_skips_candidate_without_capability() {
        let calls = RefCell::new(Vec::new());
        let result = first_supported("op", &session(&["urn:old"]), &[Api::New, Api::Old], |api| {
            calls.borrow_mut().push(api);
            async move { Ok::<_, JmapError>(api) }
        })
        .await
        .unwrap();
        assert_eq!(result, Api::Old);
        assert_eq!(*calls.borrow(), vec![Api::Old]);
    }

    #[tokio::test]
    async fn test_record_absence_stops_search() {
        let calls = RefCell::new(0);
        let account = session(&["urn:new", "urn:old"]);
        let err = first_supported("op", &account, &[Api::New, Api::Old], |_| {
            *calls.borrow_mut() += 1;
            async move {
                let mut failures = BTreeMap::new();
                failures.insert("C1".to_string(), SetError::not_found());
                Err::<(), _>(JmapError::rejection(Rejection::new(
                    "get",
                    "ContactCard/get",
                    RejectionKind::NotFound,
                    failures,
                )))
            }
        })
        .await
        .unwrap_err();
        assert!(err.as_rejection().is_some());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_all_unsupported() {
        let account = session(&["urn:new"]);
        let err = first_supported("list contacts", &account, &[Api::New, Api::Old], |_| async {
            Err::<(), _>(unsupported())
        })
        .await
        .unwrap_err();
        match err {
            JmapError::Unsupported { operation, tried } => {
                assert_eq!(operation, "list contacts");
                assert_eq!(tried, vec!["new", "old"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

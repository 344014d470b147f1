use crate::batch::Batch;
use crate::codec::{MethodResponse, WireResponse};
use crate::error::{JmapError, Result};
use serde_json::Value;
use tracing::trace;

/// Result of one submitted step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub label: String,
    pub method: String,
    pub payload: Value,
    /// Follow-up responses the server emitted under the same label, such as
    /// the `Email/set` triggered by `onSuccessUpdateEmail`.
    pub implicit: Vec<(String, Value)>,
}

impl StepResult {
    pub fn is_error(&self) -> bool {
        self.method == "error"
    }

    pub fn implicit_response(&self, method: &str) -> Option<&Value> {
        self.implicit
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, payload)| payload)
    }
}

/// Per-step results of one batch, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    steps: Vec<StepResult>,
    session_state: Option<String>,
}

impl BatchResponse {
    /// Match a decoded response against the batch that produced it.
    ///
    /// The response must hold one step per submitted step with labels matching
    /// positionally. Consecutive responses carrying the label of the step just
    /// matched are attached to it as implicit responses.
    pub fn from_wire(batch: &Batch, wire: WireResponse) -> Result<Self> {
        Self::match_labels(&batch.labels(), wire)
    }

    pub fn match_labels(expected: &[&str], wire: WireResponse) -> Result<Self> {
        let mut steps: Vec<StepResult> = Vec::with_capacity(expected.len());

        for MethodResponse(method, payload, label) in wire.method_responses {
            if let Some(last) = steps.last_mut() {
                if last.label == label {
                    trace!("implicit {} response for step '{}'", method, label);
                    last.implicit.push((method, payload));
                    continue;
                }
            }

            let position = steps.len();
            match expected.get(position) {
                Some(wanted) if *wanted == label => steps.push(StepResult {
                    label,
                    method,
                    payload,
                    implicit: Vec::new(),
                }),
                Some(wanted) => {
                    return Err(JmapError::protocol(format!(
                        "response step {} is labelled '{}', expected '{}'",
                        position, label, wanted
                    )))
                }
                None => {
                    return Err(JmapError::protocol(format!(
                        "response has more steps than the {} submitted (extra label '{}')",
                        expected.len(),
                        label
                    )))
                }
            }
        }

        if steps.len() != expected.len() {
            return Err(JmapError::protocol(format!(
                "response has {} steps, request had {}",
                steps.len(),
                expected.len()
            )));
        }

        Ok(BatchResponse {
            steps,
            session_state: wire.session_state,
        })
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn session_state(&self) -> Option<&str> {
        self.session_state.as_deref()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.label.as_str()).collect()
    }
}

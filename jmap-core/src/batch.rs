// Batch composition
// A batch is an ordered list of labelled method calls sent in one request.
// Later calls may take an argument from an earlier call's result through a
// back-reference instead of a literal value, so a query and the fetch of its
// results travel together.

use crate::capability::CapabilitySet;
use crate::error::BuildError;
use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Placeholder for "the value at `path` in the result of step `result_of`".
///
/// Serialized under a `#`-prefixed argument key, e.g.
/// `"#ids": {"resultOf": "query", "name": "Email/query", "path": "/ids"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackReference {
    pub result_of: String,
    pub name: String,
    pub path: String,
}

impl BackReference {
    pub fn new(
        result_of: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        BackReference {
            result_of: result_of.into(),
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "resultOf": self.result_of,
            "name": self.name,
            "path": self.path,
        })
    }
}

/// Reference to an object created earlier in the same batch under `creation_id`.
pub fn creation_ref(creation_id: &str) -> String {
    format!("#{}", creation_id)
}

/// Argument object of one method call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Arguments(Map::new())
    }

    /// Set a literal argument.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an argument whose value is taken from an earlier step's result.
    pub fn reference(mut self, key: &str, reference: BackReference) -> Self {
        self.0.remove(key);
        self.0.insert(format!("#{}", key), reference.to_value());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All back-references in this argument object, keyed by the argument they
    /// fill (without the `#` prefix).
    ///
    /// A `#`-prefixed key whose value is not a reference object is not a
    /// back-reference (creation-id keys inside patches look similar).
    pub fn references(&self) -> Vec<(&str, BackReference)> {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix('#')?;
                let reference = BackReference::deserialize(value).ok()?;
                Some((name, reference))
            })
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Arguments(map)
    }
}

impl Serialize for Arguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// One labelled method call. Serializes as the wire triple
/// `[method, arguments, label]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStep {
    pub method: String,
    pub arguments: Arguments,
    pub label: String,
}

impl Serialize for BatchStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.method)?;
        tuple.serialize_element(&self.arguments)?;
        tuple.serialize_element(&self.label)?;
        tuple.end()
    }
}

/// Handle to a step already in the batch, used to reference its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    label: String,
    method: String,
}

impl StepRef {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Reference the value at JSON pointer `path` in this step's result.
    pub fn result(&self, path: &str) -> BackReference {
        BackReference::new(&self.label, &self.method, path)
    }
}

/// Builder for a multi-call request. Pure data, performs no I/O.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    using: CapabilitySet,
    steps: Vec<BatchStep>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = Self::new();
        batch.using.extend(capabilities);
        batch
    }

    /// Declare an additional capability namespace for the request.
    pub fn using(&mut self, capability: impl Into<String>) -> &mut Self {
        self.using.insert(capability);
        self
    }

    /// Append a call.
    ///
    /// Fails when `label` is already used, or when `arguments` hold a
    /// back-reference to a step that is not earlier in this batch or whose
    /// method name differs from the referenced step's.
    pub fn call(
        &mut self,
        label: impl Into<String>,
        method: impl Into<String>,
        arguments: Arguments,
    ) -> Result<StepRef, BuildError> {
        let label = label.into();
        let method = method.into();

        if self.steps.iter().any(|step| step.label == label) {
            return Err(BuildError::DuplicateLabel(label));
        }

        for (_, reference) in arguments.references() {
            let target = self
                .steps
                .iter()
                .find(|step| step.label == reference.result_of)
                .ok_or_else(|| BuildError::UnknownStep {
                    label: label.clone(),
                    target: reference.result_of.clone(),
                })?;

            if target.method != reference.name {
                return Err(BuildError::MethodMismatch {
                    label: label.clone(),
                    target: reference.result_of.clone(),
                    expected: reference.name.clone(),
                    actual: target.method.clone(),
                });
            }
        }

        self.steps.push(BatchStep {
            method: method.clone(),
            arguments,
            label: label.clone(),
        });

        Ok(StepRef { label, method })
    }

    /// Append a call whose arguments are given as a JSON object.
    pub fn call_json(
        &mut self,
        label: impl Into<String>,
        method: impl Into<String>,
        arguments: Value,
    ) -> Result<StepRef, BuildError> {
        let label = label.into();
        match arguments {
            Value::Object(map) => self.call(label, method, Arguments::from(map)),
            _ => Err(BuildError::NotAnObject(label)),
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.using
    }

    pub fn steps(&self) -> &[BatchStep] {
        &self.steps
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

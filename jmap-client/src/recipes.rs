// Batch recipes shared by the domain modules. Pure data assembly; every
// recipe can be checked without a network.

use jmap_core::{Arguments, Batch, BuildError, StepRef};
use serde_json::{json, Map, Value};

pub const QUERY: &str = "query";
pub const GET: &str = "get";

/// `Foo/query` followed by `Foo/get` of the ids the query produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryThenGet {
    type_name: String,
    account_id: String,
    filter: Value,
    sort: Option<Value>,
    limit: Option<usize>,
    properties: Option<Vec<String>>,
    get_options: Map<String, Value>,
}

impl QueryThenGet {
    pub fn new(type_name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            account_id: account_id.into(),
            filter: json!({}),
            sort: None,
            limit: None,
            properties: None,
            get_options: Map::new(),
        }
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn properties(mut self, properties: &[&str]) -> Self {
        self.properties = Some(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Extra argument for the get step (e.g. `fetchTextBodyValues`).
    pub fn get_option(mut self, key: &str, value: Value) -> Self {
        self.get_options.insert(key.to_string(), value);
        self
    }

    /// Append both steps under the labels [`QUERY`] and [`GET`]; returns the
    /// get step.
    pub fn append_to(&self, batch: &mut Batch) -> Result<StepRef, BuildError> {
        self.append_labeled(batch, QUERY, GET)
    }

    pub fn append_labeled(
        &self,
        batch: &mut Batch,
        query_label: &str,
        get_label: &str,
    ) -> Result<StepRef, BuildError> {
        let mut query_args = Arguments::new()
            .set("accountId", self.account_id.as_str())
            .set("filter", self.filter.clone());
        if let Some(sort) = &self.sort {
            query_args.insert("sort", sort.clone());
        }
        if let Some(limit) = self.limit {
            query_args.insert("limit", limit);
        }
        let query = batch.call(
            query_label,
            format!("{}/query", self.type_name),
            query_args,
        )?;

        let mut get_args =
            get_arguments::<&str>(&self.account_id, None, self.properties.as_deref());
        for (key, value) in &self.get_options {
            get_args.insert(key.clone(), value.clone());
        }
        batch.call(
            get_label,
            format!("{}/get", self.type_name),
            get_args.reference("ids", query.result("/ids")),
        )
    }
}

/// Arguments of a `/get` call. `ids: None` fetches every record.
pub fn get_arguments<S: AsRef<str>>(
    account_id: &str,
    ids: Option<&[S]>,
    properties: Option<&[String]>,
) -> Arguments {
    let ids = match ids {
        Some(ids) => Value::Array(ids.iter().map(|id| Value::from(id.as_ref())).collect()),
        None => Value::Null,
    };
    let mut arguments = Arguments::new()
        .set("accountId", account_id)
        .set("ids", ids);
    if let Some(properties) = properties {
        arguments.insert("properties", json!(properties));
    }
    arguments
}

/// One `/set` step updating every id with its patch.
pub fn update<I>(
    batch: &mut Batch,
    label: &str,
    type_name: &str,
    account_id: &str,
    patches: I,
) -> Result<StepRef, BuildError>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let update: Map<String, Value> = patches.into_iter().collect();
    batch.call(
        label,
        format!("{}/set", type_name),
        Arguments::new()
            .set("accountId", account_id)
            .set("update", Value::Object(update)),
    )
}

/// One `/set` step creating `object` under `creation_id`.
pub fn create(
    batch: &mut Batch,
    label: &str,
    type_name: &str,
    account_id: &str,
    creation_id: &str,
    object: Value,
) -> Result<StepRef, BuildError> {
    let mut create = Map::new();
    create.insert(creation_id.to_string(), object);
    batch.call(
        label,
        format!("{}/set", type_name),
        Arguments::new()
            .set("accountId", account_id)
            .set("create", Value::Object(create)),
    )
}

#![forbid(unsafe_code)]

//! Serializable query documents submitted to the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Operation requested from the engine for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryAction {
    /// Fetch one record by a unique selector.
    FindUnique,
    /// Fetch the first record matching a filter.
    FindFirst,
    /// Fetch every record matching a filter.
    FindMany,
    /// Insert one record.
    CreateOne,
    /// Insert several records.
    CreateMany,
    /// Update one record by a unique selector.
    UpdateOne,
    /// Update every record matching a filter.
    UpdateMany,
    /// Insert or update one record.
    UpsertOne,
    /// Delete one record by a unique selector.
    DeleteOne,
    /// Delete every record matching a filter.
    DeleteMany,
    /// Aggregate over matching records (also serves `count`).
    Aggregate,
    /// Group matching records.
    GroupBy,
    /// Run a raw statement that returns an affected-row count.
    ExecuteRaw,
    /// Run a raw query that returns rows.
    QueryRaw,
}

impl QueryAction {
    /// Wire name used by the engine protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryAction::FindUnique => "findUnique",
            QueryAction::FindFirst => "findFirst",
            QueryAction::FindMany => "findMany",
            QueryAction::CreateOne => "createOne",
            QueryAction::CreateMany => "createMany",
            QueryAction::UpdateOne => "updateOne",
            QueryAction::UpdateMany => "updateMany",
            QueryAction::UpsertOne => "upsertOne",
            QueryAction::DeleteOne => "deleteOne",
            QueryAction::DeleteMany => "deleteMany",
            QueryAction::Aggregate => "aggregate",
            QueryAction::GroupBy => "groupBy",
            QueryAction::ExecuteRaw => "executeRaw",
            QueryAction::QueryRaw => "queryRaw",
        }
    }

    /// Raw actions are not bound to a model.
    pub fn is_raw(self) -> bool {
        matches!(self, QueryAction::ExecuteRaw | QueryAction::QueryRaw)
    }
}

impl fmt::Display for QueryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical query, opaque to the coalescer.
///
/// `query` holds the action arguments (`where`, `data`, `select`, ...) exactly
/// as the engine expects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDocument {
    /// Target model, absent for raw queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Requested operation.
    pub action: QueryAction,
    /// Action arguments.
    #[serde(default = "empty_object")]
    pub query: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl QueryDocument {
    /// Starts a document for `action` on `model`.
    pub fn new(model: impl Into<String>, action: QueryAction) -> Self {
        Self {
            model_name: Some(model.into()),
            action,
            query: empty_object(),
        }
    }

    /// Starts a raw document that carries SQL text and positional parameters.
    pub fn raw(action: QueryAction, sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        let mut query = Map::new();
        query.insert("query".into(), Value::String(sql.into()));
        query.insert("parameters".into(), Value::Array(parameters));
        Self {
            model_name: None,
            action,
            query: Value::Object(query),
        }
    }

    /// Sets one argument, replacing any previous value under `key`.
    pub fn arg(mut self, key: impl Into<String>, value: Value) -> Self {
        if !self.query.is_object() {
            self.query = empty_object();
        }
        if let Value::Object(map) = &mut self.query {
            map.insert(key.into(), value);
        }
        self
    }

    /// Restricts the returned fields.
    pub fn select<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selection: Map<String, Value> = fields
            .into_iter()
            .map(|field| (field.into(), Value::Bool(true)))
            .collect();
        self.arg("select", Value::Object(selection))
    }

    /// Returns the argument stored under `key`, if any.
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }
}

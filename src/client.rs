#![forbid(unsafe_code)]

//! Typed client over the request coalescer.
//!
//! Every delegate call builds a [`QueryDocument`] and submits it to the shared
//! [`RequestCoalescer`]. Calls that are awaited together (for example through
//! `tokio::join!`) land in the same window and reach the engine as one batch.

use serde::de::{DeserializeOwned, Error as _};
use serde_json::{json, Value};

use crate::coalescer::{CoalescerOptions, QueryTicket, RequestCoalescer};
use crate::document::{QueryAction, QueryDocument};
use crate::engine::BatchExecutor;
use crate::error::{QueryError, Result};
use crate::schema::Model;

/// Entry point for issuing queries against the weekly booking schema.
pub struct Client<E> {
    coalescer: RequestCoalescer<E>,
}

impl<E> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            coalescer: self.coalescer.clone(),
        }
    }
}

impl<E: BatchExecutor> Client<E> {
    /// Creates a client on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(executor: E, options: CoalescerOptions) -> Self {
        Self::from_coalescer(RequestCoalescer::new(executor, options))
    }

    /// Wraps an existing coalescer.
    pub fn from_coalescer(coalescer: RequestCoalescer<E>) -> Self {
        Self { coalescer }
    }

    /// Returns the underlying coalescer.
    pub fn coalescer(&self) -> &RequestCoalescer<E> {
        &self.coalescer
    }

    /// Submits a prebuilt document.
    pub fn submit(&self, document: QueryDocument) -> QueryTicket {
        self.coalescer.submit(document)
    }

    /// Returns the delegate for `model`.
    pub fn model(&self, model: Model) -> ModelDelegate<'_, E> {
        ModelDelegate {
            client: self,
            model,
        }
    }

    /// Delegate for [`Model::Booking`].
    pub fn booking(&self) -> ModelDelegate<'_, E> {
        self.model(Model::Booking)
    }

    /// Delegate for [`Model::Availability`].
    pub fn availability(&self) -> ModelDelegate<'_, E> {
        self.model(Model::Availability)
    }

    /// Delegate for [`Model::WeeklySlot`].
    pub fn weekly_slot(&self) -> ModelDelegate<'_, E> {
        self.model(Model::WeeklySlot)
    }

    /// Delegate for [`Model::Resource`].
    pub fn resource(&self) -> ModelDelegate<'_, E> {
        self.model(Model::Resource)
    }

    /// Delegate for [`Model::Customer`].
    pub fn customer(&self) -> ModelDelegate<'_, E> {
        self.model(Model::Customer)
    }

    /// Runs a raw query and decodes the returned rows.
    pub async fn query_raw<T: DeserializeOwned>(
        &self,
        sql: &str,
        parameters: Vec<Value>,
    ) -> Result<T> {
        self.submit(QueryDocument::raw(QueryAction::QueryRaw, sql, parameters))
            .decode()
            .await
    }

    /// Runs a raw statement and returns the affected row count.
    pub async fn execute_raw(&self, sql: &str, parameters: Vec<Value>) -> Result<u64> {
        self.submit(QueryDocument::raw(QueryAction::ExecuteRaw, sql, parameters))
            .decode()
            .await
    }
}

/// Per-model query operations.
///
/// Delegates are `Copy`, so calls made on a temporary such as
/// `client.booking().find_many(..)` can be joined directly.
pub struct ModelDelegate<'c, E> {
    client: &'c Client<E>,
    model: Model,
}

impl<E> Clone for ModelDelegate<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for ModelDelegate<'_, E> {}

impl<'c, E: BatchExecutor> ModelDelegate<'c, E> {
    /// Model this delegate targets.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Starts a document for `action` on this model.
    pub fn document(&self, action: QueryAction) -> QueryDocument {
        QueryDocument::new(self.model.name(), action)
    }

    /// Fetches the record matching a unique selector, if any.
    pub async fn find_unique<T: DeserializeOwned>(self, selector: Value) -> Result<Option<T>> {
        let doc = self.document(QueryAction::FindUnique).arg("where", selector);
        self.client.submit(doc).decode().await
    }

    /// Fetches the first record matching `args` (`where`, `orderBy`, ...).
    ///
    /// `args` must be a JSON object or `null`.
    pub async fn find_first<T: DeserializeOwned>(self, args: Value) -> Result<Option<T>> {
        let doc = with_args(self.document(QueryAction::FindFirst), args)?;
        self.client.submit(doc).decode().await
    }

    /// Fetches every record matching `args`.
    pub async fn find_many<T: DeserializeOwned>(self, args: Value) -> Result<Vec<T>> {
        let doc = with_args(self.document(QueryAction::FindMany), args)?;
        self.client.submit(doc).decode().await
    }

    /// Creates one record from `data`.
    pub async fn create<T: DeserializeOwned>(self, data: Value) -> Result<T> {
        let doc = self.document(QueryAction::CreateOne).arg("data", data);
        self.client.submit(doc).decode().await
    }

    /// Updates the record matching `selector` with `data`.
    pub async fn update<T: DeserializeOwned>(self, selector: Value, data: Value) -> Result<T> {
        let doc = self
            .document(QueryAction::UpdateOne)
            .arg("where", selector)
            .arg("data", data);
        self.client.submit(doc).decode().await
    }

    /// Deletes the record matching `selector` and returns it.
    pub async fn delete<T: DeserializeOwned>(self, selector: Value) -> Result<T> {
        let doc = self.document(QueryAction::DeleteOne).arg("where", selector);
        self.client.submit(doc).decode().await
    }

    /// Counts records matching `filter` (all records when `None`).
    pub async fn count(self, filter: Option<Value>) -> Result<u64> {
        let mut doc = self
            .document(QueryAction::Aggregate)
            .arg("select", json!({"_count": {"select": {"_all": true}}}));
        if let Some(filter) = filter {
            doc = doc.arg("where", filter);
        }
        let value = self.client.submit(doc).await?;
        value
            .pointer("/_count/_all")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                QueryError::Decode(serde_json::Error::custom(format!(
                    "aggregate result lacks _count._all: {value}"
                )))
            })
    }
}

fn with_args(mut doc: QueryDocument, args: Value) -> Result<QueryDocument> {
    match args {
        Value::Null => Ok(doc),
        Value::Object(map) => {
            for (key, value) in map {
                doc = doc.arg(key, value);
            }
            Ok(doc)
        }
        other => Err(QueryError::Decode(serde_json::Error::custom(format!(
            "{} arguments must be an object, got {other}",
            doc.action
        )))),
    }
}

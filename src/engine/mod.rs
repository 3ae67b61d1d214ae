#![forbid(unsafe_code)]

//! Seam between the coalescer and the external query engine.
//!
//! The coalescer only knows [`BatchExecutor`]. [`EngineExecutor`] implements
//! it on top of the engine's JSON batch protocol, moving encoded envelopes
//! through any [`EngineTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::QueryDocument;
use crate::error::{EngineError, ExecutorError};

/// Engine protocol envelopes and response unpacking.
pub mod protocol;

/// Transport that drives an engine child process over stdin/stdout.
pub mod process;

pub use process::{ProcessTransport, ProcessTransportOptions};

/// Outcome of one item in a batch response.
pub type ItemOutcome = std::result::Result<Value, EngineError>;

/// Executes an ordered batch of query documents.
///
/// On success the returned vector must be index-aligned with `batch`: element
/// `i` answers `batch[i]`. A returned `Err` fails every query in the batch.
#[async_trait]
pub trait BatchExecutor: Send + Sync + 'static {
    /// Runs `batch` as one engine call.
    async fn execute_batch(
        &self,
        batch: Vec<QueryDocument>,
    ) -> std::result::Result<Vec<ItemOutcome>, ExecutorError>;
}

#[async_trait]
impl<E> BatchExecutor for Arc<E>
where
    E: BatchExecutor + ?Sized,
{
    async fn execute_batch(
        &self,
        batch: Vec<QueryDocument>,
    ) -> std::result::Result<Vec<ItemOutcome>, ExecutorError> {
        (**self).execute_batch(batch).await
    }
}

/// Moves one encoded request to the engine and returns its encoded reply.
#[async_trait]
pub trait EngineTransport: Send + Sync + 'static {
    /// Sends `request` and waits for the matching response.
    async fn round_trip(&self, request: String) -> std::result::Result<String, ExecutorError>;
}

#[async_trait]
impl<T> EngineTransport for Arc<T>
where
    T: EngineTransport + ?Sized,
{
    async fn round_trip(&self, request: String) -> std::result::Result<String, ExecutorError> {
        (**self).round_trip(request).await
    }
}

/// [`BatchExecutor`] speaking the engine's JSON batch protocol.
pub struct EngineExecutor<T> {
    transport: T,
}

impl<T: EngineTransport> EngineExecutor<T> {
    /// Wraps `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: EngineTransport> BatchExecutor for EngineExecutor<T> {
    async fn execute_batch(
        &self,
        batch: Vec<QueryDocument>,
    ) -> std::result::Result<Vec<ItemOutcome>, ExecutorError> {
        let expected = batch.len();
        let request = protocol::encode_batch(&batch)?;
        debug!(
            items = expected,
            bytes = request.len(),
            "engine.executor.request"
        );
        let response = self.transport.round_trip(request).await?;
        let outcomes = protocol::decode_batch(&response, expected).inspect_err(|err| {
            warn!(items = expected, error = %err, "engine.executor.decode_failed");
        })?;
        debug!(items = outcomes.len(), "engine.executor.response");
        Ok(outcomes)
    }
}

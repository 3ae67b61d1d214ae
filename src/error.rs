#![forbid(unsafe_code)]

//! Error types shared across the client.
//!
//! Failures come in two disjoint classes. An [`ExecutorError`] means the
//! engine call for a whole batch could not be completed, so every request in
//! that batch observes the same error. An [`EngineError`] is attached to a
//! single position of an otherwise successful batch response and only reaches
//! the caller that owns that position.

use serde_json::Value;
use thiserror::Error;

/// Result type for caller-facing query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Batch-fatal failure raised while talking to the query engine.
///
/// Cloned once per pending request when a batch fails, so every variant only
/// carries owned, cloneable data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The engine could not be reached (not started, exited, pipe closed).
    #[error("query engine unreachable: {0}")]
    Unreachable(String),
    /// The request or response could not be moved across the transport.
    #[error("query engine transport failed: {0}")]
    Transport(String),
    /// The engine answered with something that does not fit the protocol.
    #[error("query engine protocol violation: {0}")]
    Protocol(String),
    /// The engine refused the batch as a whole.
    #[error("query engine rejected the batch: {0}")]
    Rejected(String),
}

impl ExecutorError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        ExecutorError::Transport(err.to_string())
    }

    pub(crate) fn protocol(err: impl std::fmt::Display) -> Self {
        ExecutorError::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for ExecutorError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotFound
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset => ExecutorError::Unreachable(err.to_string()),
            _ => ExecutorError::Transport(err.to_string()),
        }
    }
}

/// Structured error reported by the engine for one item of a batch.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}", render_engine_error(.code.as_deref(), .message))]
pub struct EngineError {
    /// Engine error code (for example `P2025`), when the engine supplied one.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Extra structured context attached by the engine.
    pub meta: Option<Value>,
}

impl EngineError {
    /// Creates an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            meta: None,
        }
    }

    /// Attaches an engine error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attaches structured metadata.
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

fn render_engine_error(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("[{code}] {message}"),
        None => message.to_string(),
    }
}

/// Error observed by a caller awaiting a submitted query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The engine rejected this particular query.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The batch carrying this query failed as a whole.
    #[error("batch failed: {0}")]
    Batch(#[from] ExecutorError),
    /// The result slot was dropped before an outcome was delivered.
    #[error("request dropped before the batch completed")]
    Closed,
    /// The result could not be decoded into the requested type.
    #[error("failed to decode query result: {0}")]
    Decode(#[from] serde_json::Error),
}

impl QueryError {
    /// Returns the engine error if this failure is local to the query.
    pub fn as_engine(&self) -> Option<&EngineError> {
        match self {
            QueryError::Engine(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the batch error if the whole batch failed.
    pub fn as_batch(&self) -> Option<&ExecutorError> {
        match self {
            QueryError::Batch(err) => Some(err),
            _ => None,
        }
    }
}

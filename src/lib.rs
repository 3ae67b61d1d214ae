//! Client for the weekly booking query engine.
//!
//! Logical queries are described as [`QueryDocument`]s and submitted to a
//! [`RequestCoalescer`], which batches everything issued within one scheduling
//! window into a single engine call and hands each caller its own result.

#![warn(missing_docs)]

pub mod client;
pub mod coalescer;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod logging;
pub mod schema;

pub use client::{Client, ModelDelegate};
pub use coalescer::{CoalesceWindow, CoalescerOptions, QueryTicket, RequestCoalescer};
pub use document::{QueryAction, QueryDocument};
pub use engine::{BatchExecutor, EngineExecutor, EngineTransport, ItemOutcome, ProcessTransport};
pub use error::{EngineError, ExecutorError, QueryError, Result};
pub use schema::Model;

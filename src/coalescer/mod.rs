#![forbid(unsafe_code)]

//! Request coalescing in front of a [`BatchExecutor`].
//!
//! Queries submitted during one coalescing window are collected into a single
//! batch and executed with one engine call. The response is fanned back out to
//! the individual [`QueryTicket`]s by position.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::document::QueryDocument;
use crate::engine::BatchExecutor;
use crate::error::{ExecutorError, QueryError, Result};

/// Counters describing coalescer activity.
pub mod metrics;

pub use metrics::{default_metrics, CoalescerMetrics, CoalescerStats, CounterMetrics, NoopMetrics};

/// How long a coalescing window stays open after its first submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoalesceWindow {
    /// Close the window at the next scheduler turn.
    #[default]
    Tick,
    /// Keep the window open for a fixed delay.
    Delay(Duration),
}

impl CoalesceWindow {
    /// Builds a window from milliseconds; `0` selects [`CoalesceWindow::Tick`].
    pub fn from_millis(ms: u64) -> Self {
        CoalesceWindow::Delay(Duration::from_millis(ms)).normalize()
    }

    fn normalize(self) -> Self {
        match self {
            CoalesceWindow::Delay(delay) if delay.is_zero() => CoalesceWindow::Tick,
            other => other,
        }
    }

    async fn elapse(self) {
        match self {
            CoalesceWindow::Tick => tokio::task::yield_now().await,
            CoalesceWindow::Delay(delay) => tokio::time::sleep(delay).await,
        }
    }
}

/// Configuration for a [`RequestCoalescer`].
#[derive(Clone)]
pub struct CoalescerOptions {
    /// Window after which pending queries are flushed.
    pub window: CoalesceWindow,
    /// Sink for coalescer counters.
    pub metrics: Arc<dyn CoalescerMetrics>,
}

impl Default for CoalescerOptions {
    fn default() -> Self {
        Self {
            window: CoalesceWindow::Tick,
            metrics: default_metrics(),
        }
    }
}

impl std::fmt::Debug for CoalescerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescerOptions")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl CoalescerOptions {
    /// Sets the coalescing window.
    pub fn window(mut self, window: CoalesceWindow) -> Self {
        self.window = window;
        self
    }

    /// Sets the metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn CoalescerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Collapses concurrently submitted queries into batched executor calls.
///
/// Cloning is cheap and every clone feeds the same pending queue.
pub struct RequestCoalescer<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for RequestCoalescer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<E> {
    executor: E,
    state: Mutex<PendingState>,
    window: CoalesceWindow,
    metrics: Arc<dyn CoalescerMetrics>,
    runtime: Handle,
    next_batch: AtomicU64,
}

#[derive(Default)]
struct PendingState {
    pending: Vec<PendingRequest>,
    flush_scheduled: bool,
}

struct PendingRequest {
    document: QueryDocument,
    slot: oneshot::Sender<Result<Value>>,
}

impl<E: BatchExecutor> RequestCoalescer<E> {
    /// Creates a coalescer that flushes on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(executor: E, options: CoalescerOptions) -> Self {
        Self::with_runtime(executor, options, Handle::current())
    }

    /// Creates a coalescer that spawns its flush tasks on `runtime`.
    pub fn with_runtime(executor: E, options: CoalescerOptions, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                state: Mutex::new(PendingState::default()),
                window: options.window.normalize(),
                metrics: options.metrics,
                runtime,
                next_batch: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueues `document` and returns a ticket for its result.
    ///
    /// Never blocks; the query joins the currently open window, opening one
    /// if none is pending.
    pub fn submit(&self, document: QueryDocument) -> QueryTicket {
        let (slot, receiver) = oneshot::channel();
        let schedule = {
            let mut state = self.inner.state.lock();
            state.pending.push(PendingRequest { document, slot });
            let schedule = !state.flush_scheduled;
            state.flush_scheduled = true;
            debug!(
                pending = state.pending.len(),
                opens_window = schedule,
                "coalescer.submit"
            );
            schedule
        };
        self.inner.metrics.query_submitted();
        if schedule {
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(async move {
                inner.window.elapse().await;
                inner.flush().await;
            });
        }
        QueryTicket { receiver }
    }

    /// Number of queries waiting for the current window to close.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Returns the wrapped executor.
    pub fn executor(&self) -> &E {
        &self.inner.executor
    }
}

impl<E: BatchExecutor> Inner<E> {
    async fn flush(&self) {
        let batch = {
            let mut state = self.state.lock();
            state.flush_scheduled = false;
            mem::take(&mut state.pending)
        };
        if batch.is_empty() {
            return;
        }
        let batch_id = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let size = batch.len();
        let (documents, slots): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .map(|req| (req.document, req.slot))
            .unzip();
        self.metrics.batch_flushed(size);
        debug!(batch_id, size, "coalescer.flush.start");

        match self.executor.execute_batch(documents).await {
            Ok(outcomes) if outcomes.len() == size => {
                let mut failed = 0usize;
                for (slot, outcome) in slots.into_iter().zip(outcomes) {
                    if outcome.is_err() {
                        failed += 1;
                    }
                    let _ = slot.send(outcome.map_err(QueryError::Engine));
                }
                self.metrics.batch_completed(size - failed, failed);
                debug!(batch_id, size, failed, "coalescer.flush.complete");
            }
            Ok(outcomes) => {
                let err = ExecutorError::Protocol(format!(
                    "batch of {size} queries answered with {} results",
                    outcomes.len()
                ));
                self.fail_batch(batch_id, slots, &err);
            }
            Err(err) => self.fail_batch(batch_id, slots, &err),
        }
    }

    fn fail_batch(
        &self,
        batch_id: u64,
        slots: Vec<oneshot::Sender<Result<Value>>>,
        err: &ExecutorError,
    ) {
        warn!(batch_id, size = slots.len(), error = %err, "coalescer.flush.failed");
        self.metrics.batch_failed(slots.len());
        for slot in slots {
            let _ = slot.send(Err(QueryError::Batch(err.clone())));
        }
    }
}

/// Pending result of a submitted query.
///
/// Resolves once the batch carrying the query completes. Dropping the ticket
/// does not withdraw the query from its batch.
#[must_use = "a ticket does nothing unless awaited"]
#[derive(Debug)]
pub struct QueryTicket {
    receiver: oneshot::Receiver<Result<Value>>,
}

impl QueryTicket {
    /// Waits for the result and decodes it into `T`.
    pub async fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let value = self.await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl Future for QueryTicket {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueryError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

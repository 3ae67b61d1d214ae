use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking coalescer activity.
///
/// Implementations observe every submission, every batch handed to the
/// executor, and how each batch settled. Callbacks run on the submitting task
/// or on the flush task, so they must be cheap and thread-safe.
pub trait CoalescerMetrics: Send + Sync {
    /// Records a query entering the pending queue.
    fn query_submitted(&self);

    /// Records a batch being handed to the executor.
    ///
    /// # Parameters
    /// * `size` - Number of queries in the batch.
    fn batch_flushed(&self, size: usize);

    /// Records a batch whose executor call completed.
    ///
    /// # Parameters
    /// * `ok` - Items that resolved with a value.
    /// * `failed` - Items the engine rejected individually.
    fn batch_completed(&self, ok: usize, failed: usize);

    /// Records a batch whose executor call failed as a whole.
    ///
    /// # Parameters
    /// * `size` - Number of queries rejected with the batch error.
    fn batch_failed(&self, size: usize);
}

/// A no-op implementation of [`CoalescerMetrics`].
#[derive(Default)]
pub struct NoopMetrics;

impl CoalescerMetrics for NoopMetrics {
    fn query_submitted(&self) {}
    fn batch_flushed(&self, _size: usize) {}
    fn batch_completed(&self, _ok: usize, _failed: usize) {}
    fn batch_failed(&self, _size: usize) {}
}

/// A thread-safe counter-based implementation of [`CoalescerMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of queries submitted.
    pub queries_submitted: AtomicU64,

    /// Number of batches handed to the executor.
    pub batches_flushed: AtomicU64,

    /// Sum of all flushed batch sizes.
    pub batched_queries: AtomicU64,

    /// Largest batch observed so far.
    pub max_batch_size: AtomicU64,

    /// Items resolved with a value.
    pub items_succeeded: AtomicU64,

    /// Items rejected by the engine individually.
    pub items_failed: AtomicU64,

    /// Batches whose executor call failed outright.
    pub batches_failed: AtomicU64,

    /// Items rejected because their batch failed.
    pub items_rejected_by_batch: AtomicU64,
}

impl CounterMetrics {
    /// Returns a plain snapshot of the counters.
    pub fn snapshot(&self) -> CoalescerStats {
        CoalescerStats {
            queries_submitted: self.queries_submitted.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batched_queries: self.batched_queries.load(Ordering::Relaxed),
            max_batch_size: self.max_batch_size.load(Ordering::Relaxed),
            items_succeeded: self.items_succeeded.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            items_rejected_by_batch: self.items_rejected_by_batch.load(Ordering::Relaxed),
        }
    }
}

impl CoalescerMetrics for CounterMetrics {
    fn query_submitted(&self) {
        self.queries_submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn batch_flushed(&self, size: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.batched_queries
            .fetch_add(size as u64, Ordering::Relaxed);
        self.max_batch_size
            .fetch_max(size as u64, Ordering::Relaxed);
    }

    fn batch_completed(&self, ok: usize, failed: usize) {
        self.items_succeeded.fetch_add(ok as u64, Ordering::Relaxed);
        self.items_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    fn batch_failed(&self, size: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.items_rejected_by_batch
            .fetch_add(size as u64, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CoalescerStats {
    /// Number of queries submitted.
    pub queries_submitted: u64,
    /// Number of batches handed to the executor.
    pub batches_flushed: u64,
    /// Sum of all flushed batch sizes.
    pub batched_queries: u64,
    /// Largest batch observed so far.
    pub max_batch_size: u64,
    /// Items resolved with a value.
    pub items_succeeded: u64,
    /// Items rejected by the engine individually.
    pub items_failed: u64,
    /// Batches whose executor call failed outright.
    pub batches_failed: u64,
    /// Items rejected because their batch failed.
    pub items_rejected_by_batch: u64,
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn CoalescerMetrics> {
    Arc::new(NoopMetrics)
}

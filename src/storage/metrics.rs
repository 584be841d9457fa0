use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking segment chain activity.
///
/// Implementations of this trait collect statistics about writer-side
/// mutations (appends, rollovers, evictions) and reader-side segment fetches.
/// Every hook is called on a hot path, so implementations should be cheap.
pub trait ChainMetrics: Send + Sync {
    /// Records an edge appended to the live segment.
    fn edge_appended(&self);

    /// Records a rollover that sealed the live segment.
    fn segment_rolled(&self);

    /// Records a segment leaving the retained window.
    fn segment_evicted(&self);

    /// Records a per-segment cursor handed out by the accessor.
    ///
    /// # Parameters
    /// * `empty` - Whether the node had no edges in that segment.
    fn segment_fetch(&self, empty: bool);
}

/// A no-op implementation of [`ChainMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl ChainMetrics for NoopMetrics {
    fn edge_appended(&self) {}
    fn segment_rolled(&self) {}
    fn segment_evicted(&self) {}
    fn segment_fetch(&self, _empty: bool) {}
}

/// A thread-safe counter-based implementation of [`ChainMetrics`].
///
/// All counters use relaxed atomics and can be read from any thread.
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of edges appended.
    pub edges_appended: AtomicU64,

    /// Number of rollovers.
    pub segments_rolled: AtomicU64,

    /// Number of evicted segments.
    pub segments_evicted: AtomicU64,

    /// Number of cursors returned by the accessor.
    pub segment_fetches: AtomicU64,

    /// Number of fetched cursors that were empty.
    pub empty_fetches: AtomicU64,
}

impl ChainMetrics for CounterMetrics {
    fn edge_appended(&self) {
        self.edges_appended.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_rolled(&self) {
        self.segments_rolled.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_evicted(&self) {
        self.segments_evicted.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_fetch(&self, empty: bool) {
        self.segment_fetches.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty_fetches.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn ChainMetrics> {
    Arc::new(NoopMetrics)
}

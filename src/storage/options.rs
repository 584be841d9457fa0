use std::sync::Arc;
use std::time::Duration;

use crate::types::{GraphError, Result};

/// Default number of segments retained in the window.
pub const DEFAULT_MAX_SEGMENTS: usize = 8;
/// Default edge capacity of a single segment.
pub const DEFAULT_EDGES_PER_SEGMENT: u32 = 1 << 16;
/// Default number of evicted segments kept before their slot is recycled.
pub const DEFAULT_RECLAIM_LAG: usize = 2;

/// Upper bound on `edges_per_segment`; pool offsets are stored as `u32 + 1`
/// and the node index holds twice the pool size.
const MAX_EDGES_PER_SEGMENT: u32 = 1 << 30;

/// Configuration options supplied when creating a [`super::SegmentChain`].
#[derive(Clone)]
pub struct ChainOptions {
    /// Maximum number of retained segments, live segment included.
    pub max_segments: usize,
    /// Edge capacity of each segment; the live segment rolls over when full.
    pub edges_per_segment: u32,
    /// Optional age after which the live segment rolls over on the next append.
    ///
    /// Age is measured from the moment the segment became live, independent
    /// of which writer handle opened it.
    pub max_segment_age: Option<Duration>,
    /// Rollovers an evicted segment survives before its storage is recycled.
    pub reclaim_lag: usize,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn super::metrics::ChainMetrics>>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainOptions {
    /// Creates a new ChainOptions with default settings.
    pub fn new() -> Self {
        Self {
            max_segments: DEFAULT_MAX_SEGMENTS,
            edges_per_segment: DEFAULT_EDGES_PER_SEGMENT,
            max_segment_age: None,
            reclaim_lag: DEFAULT_RECLAIM_LAG,
            metrics: None,
        }
    }

    /// Sets the maximum number of retained segments.
    pub fn max_segments(mut self, segments: usize) -> Self {
        self.max_segments = segments;
        self
    }

    /// Sets the per-segment edge capacity.
    pub fn edges_per_segment(mut self, edges: u32) -> Self {
        self.edges_per_segment = edges;
        self
    }

    /// Rolls the live segment over once it is older than `age`.
    pub fn max_segment_age(mut self, age: Duration) -> Self {
        self.max_segment_age = Some(age);
        self
    }

    /// Sets how many rollovers an evicted segment's storage survives.
    ///
    /// Zero recycles storage on the very rollover that evicts it.
    pub fn reclaim_lag(mut self, lag: usize) -> Self {
        self.reclaim_lag = lag;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn super::metrics::ChainMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of physical segment slots the chain allocates.
    pub(crate) fn ring_len(&self) -> usize {
        self.max_segments + self.reclaim_lag
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_segments == 0 {
            return Err(GraphError::Invalid("max_segments must be at least 1"));
        }
        if self.edges_per_segment == 0 {
            return Err(GraphError::Invalid("edges_per_segment must be at least 1"));
        }
        if self.edges_per_segment > MAX_EDGES_PER_SEGMENT {
            return Err(GraphError::Invalid("edges_per_segment exceeds 2^30"));
        }
        match self.max_segments.checked_add(self.reclaim_lag) {
            None => return Err(GraphError::Invalid("max_segments + reclaim_lag overflows")),
            Some(ring) if ring < 2 => {
                return Err(GraphError::Invalid(
                    "max_segments + reclaim_lag must be at least 2",
                ))
            }
            Some(_) => {}
        }
        if matches!(self.max_segment_age, Some(age) if age.is_zero()) {
            return Err(GraphError::Invalid("max_segment_age must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let opts = ChainOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.ring_len(), DEFAULT_MAX_SEGMENTS + DEFAULT_RECLAIM_LAG);
    }

    #[test]
    fn rejects_degenerate_sizes() {
        assert!(ChainOptions::new().max_segments(0).validate().is_err());
        assert!(ChainOptions::new().edges_per_segment(0).validate().is_err());
        assert!(ChainOptions::new()
            .edges_per_segment(MAX_EDGES_PER_SEGMENT + 1)
            .validate()
            .is_err());
        assert!(ChainOptions::new()
            .max_segment_age(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn eager_reclamation_is_allowed() {
        let opts = ChainOptions::new().reclaim_lag(0).max_segments(2);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.ring_len(), 2);
    }

    #[test]
    fn ring_of_one_slot_is_rejected() {
        let opts = ChainOptions::new().reclaim_lag(0).max_segments(1);
        assert!(opts.validate().is_err());
        assert!(ChainOptions::new().max_segments(1).validate().is_ok());
    }
}

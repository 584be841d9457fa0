//! Segment storage and cross-segment traversal.
//!
//! Implements the rolling segment chain, the per-segment edge cursors handed
//! out by its accessor, and the forward and reverse iterators that splice
//! those cursors into one sequence per node.

/// Accessor, cursor and window traits shared by the chain and its iterators.
pub mod accessor;

/// Segment chain and its single writer handle.
pub mod chain;

/// Forward and reverse cross-segment iterators.
pub mod iter;

mod metrics;
mod options;
mod segment;

pub use accessor::{EdgeCursor, SegmentEdgeAccessor, SegmentRange, SegmentWindow};
pub use chain::{ChainIterator, ChainStats, ChainWriter, SegmentChain};
pub use iter::{Direction, EdgeIterator, MultiSegmentIterator, TraversalState};

/// Metrics hooks.
pub use metrics::{default_metrics, ChainMetrics, CounterMetrics, NoopMetrics};

/// Chain configuration options.
pub use options::{
    ChainOptions, DEFAULT_EDGES_PER_SEGMENT, DEFAULT_MAX_SEGMENTS, DEFAULT_RECLAIM_LAG,
};

/// Per-segment cursor returned by [`SegmentChain`]'s accessor.
pub use segment::SegmentEdges;

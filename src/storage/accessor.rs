//! Seams between the cross-segment iterators and the storage they walk.

use crate::types::{NodeId, Result, SegmentId};

/// Restartable, finite cursor over one node's edges in one segment.
pub trait EdgeCursor {
    /// Returns true while at least one edge remains.
    fn has_next(&self) -> bool;

    /// Returns the next edge, or [`crate::types::GraphError::ExhaustedIteration`].
    fn next_edge(&mut self) -> Result<NodeId>;

    /// Rewinds to the first edge.
    fn restart(&mut self);
}

/// Hands out per-segment cursors.
///
/// Implementations must not block. Asking for a segment outside the retained
/// window is a contract violation and is reported as
/// [`crate::types::GraphError::InvalidSegmentReference`].
pub trait SegmentEdgeAccessor {
    /// Cursor type borrowed from the accessor.
    type Cursor<'a>: EdgeCursor
    where
        Self: 'a;

    /// Returns a cursor over `node`'s edges in `segment`, in append order.
    fn node_edges(&self, segment: SegmentId, node: NodeId) -> Result<Self::Cursor<'_>>;
}

/// Inclusive `[oldest, live]` bounds captured at one instant.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SegmentRange {
    /// Lowest retained segment.
    pub oldest: SegmentId,
    /// Segment accepting appends.
    pub live: SegmentId,
}

impl SegmentRange {
    /// Number of segments in the range; zero when `oldest > live`.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.live.0 - self.oldest.0 + 1
        }
    }

    /// True for an inverted range. A captured window always holds the live
    /// segment, so only hand-built ranges can be empty.
    pub fn is_empty(&self) -> bool {
        self.oldest > self.live
    }

    /// Returns true if `segment` lies inside the range.
    pub fn contains(&self, segment: SegmentId) -> bool {
        self.oldest <= segment && segment <= self.live
    }

    /// Segment ids from oldest to live.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = SegmentId> {
        (self.oldest.0..=self.live.0).map(SegmentId)
    }
}

/// Read-only view of the chain boundaries.
pub trait SegmentWindow {
    /// Lowest retained segment id.
    fn oldest_segment_id(&self) -> SegmentId;

    /// Current write target.
    fn live_segment_id(&self) -> SegmentId;

    /// Captures both boundaries.
    ///
    /// Oldest is loaded before live; both only move forward and oldest never
    /// passes live, so the returned range is never inverted.
    fn window(&self) -> SegmentRange {
        let oldest = self.oldest_segment_id();
        let live = self.live_segment_id();
        SegmentRange { oldest, live }
    }
}

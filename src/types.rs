//! Identifier types and the crate-wide error enum.

use std::fmt;

/// Left- or right-hand vertex key.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Key reserved for empty slots in the per-segment node index.
    pub const RESERVED: NodeId = NodeId(u64::MAX);

    /// Returns true when the key may be used as a left-hand node.
    pub fn is_valid(self) -> bool {
        self != Self::RESERVED
    }
}

/// Segment identifier, assigned in creation order.
///
/// Ids double as logical timestamps: a larger id always holds newer edges.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// The id following this one.
    pub fn next(self) -> Self {
        SegmentId(self.0 + 1)
    }

    /// The id preceding this one; saturates at zero.
    pub fn prev(self) -> Self {
        SegmentId(self.0.saturating_sub(1))
    }
}

/// Lifecycle state of a segment as seen from the chain boundaries.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SegmentState {
    /// Currently accepting appends.
    Live,
    /// Immutable and retained.
    Sealed,
    /// Below the oldest boundary; must not be addressed.
    Evicted,
}

/// Errors surfaced by the segment chain and its iterators.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// `next_edge` was called with no remaining edge.
    #[error("iteration exhausted")]
    ExhaustedIteration,
    /// A segment outside the retained window was addressed.
    #[error("segment {segment} outside retained window [{oldest}, {live}]")]
    InvalidSegmentReference {
        /// The id that was requested.
        segment: SegmentId,
        /// Oldest boundary at the time of the failure.
        oldest: SegmentId,
        /// Live boundary at the time of the failure.
        live: SegmentId,
    },
    /// Rejected argument or configuration.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Another writer handle is alive.
    #[error("writer handle already held")]
    WriterHeld,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        SegmentId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_id_steps() {
        assert_eq!(SegmentId(3).next(), SegmentId(4));
        assert_eq!(SegmentId(3).prev(), SegmentId(2));
        assert_eq!(SegmentId(0).prev(), SegmentId(0));
    }

    #[test]
    fn reserved_node_is_invalid() {
        assert!(!NodeId::RESERVED.is_valid());
        assert!(NodeId(0).is_valid());
    }

    #[test]
    fn invalid_reference_message_names_window() {
        let err = GraphError::InvalidSegmentReference {
            segment: SegmentId(9),
            oldest: SegmentId(2),
            live: SegmentId(5),
        };
        assert_eq!(err.to_string(), "segment 9 outside retained window [2, 5]");
    }
}

//! In-memory bipartite graph store organized as a rolling chain of segments.
//!
//! One writer appends edges to the live segment while any number of readers
//! traverse a node's edges across segments, oldest-first or newest-first,
//! without locks.

#![warn(missing_docs)]

pub mod storage;
pub mod types;

pub use storage::{
    ChainOptions, ChainWriter, Direction, EdgeIterator, SegmentChain, SegmentWindow,
};
pub use types::{GraphError, NodeId, Result, SegmentId, SegmentState};

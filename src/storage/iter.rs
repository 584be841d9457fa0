//! Cross-segment edge iteration.
//!
//! A [`MultiSegmentIterator`] splices per-segment cursors into one sequence
//! for a single node. The window `[oldest, live]` is captured once per
//! [`EdgeIterator::reset_for_node`], so concurrent rollovers and evictions
//! never widen or shrink a traversal that is already under way. Forward
//! traversal walks oldest to live; reverse walks live to oldest. Order inside
//! a segment is whatever the accessor's cursor yields.

use super::accessor::{EdgeCursor, SegmentEdgeAccessor, SegmentRange, SegmentWindow};
use crate::types::{GraphError, NodeId, Result, SegmentId};

/// Order in which segments are visited.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Oldest segment first.
    Forward,
    /// Live segment first.
    Reverse,
}

/// Observable traversal state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TraversalState {
    /// No node has been set yet.
    Uninitialized,
    /// Scanning the given segment.
    Positioned(SegmentId),
    /// No further edges; reset to start over.
    Exhausted,
}

/// Node-scoped, restartable edge iterator.
///
/// Forward and reverse variants share this shape so callers pick a direction
/// without changing call sites.
pub trait EdgeIterator {
    /// Replaces all traversal state and positions on `node`'s first edge.
    fn reset_for_node(&mut self, node: NodeId) -> Result<&mut Self>;

    /// Returns true if another edge is available, advancing across segments as needed.
    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next edge, or [`GraphError::ExhaustedIteration`].
    fn next_edge(&mut self) -> Result<NodeId>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Uninitialized,
    Positioned,
    Exhausted,
}

/// Traversal state shared by both directions.
struct Traversal<C> {
    node: NodeId,
    range: SegmentRange,
    current: SegmentId,
    cursor: Option<C>,
    phase: Phase,
}

impl<C: EdgeCursor> Traversal<C> {
    fn new() -> Self {
        Self {
            node: NodeId(0),
            range: SegmentRange {
                oldest: SegmentId(0),
                live: SegmentId(0),
            },
            current: SegmentId(0),
            cursor: None,
            phase: Phase::Uninitialized,
        }
    }

    fn cursor_has_next(&self) -> bool {
        self.cursor.as_ref().is_some_and(|cursor| cursor.has_next())
    }

    /// Next segment id in `direction`, or `None` at the captured boundary.
    fn step(&self, direction: Direction) -> Option<SegmentId> {
        match direction {
            Direction::Forward if self.current < self.range.live => Some(self.current.next()),
            Direction::Reverse if self.current > self.range.oldest => Some(self.current.prev()),
            _ => None,
        }
    }

    fn abort(&mut self) {
        self.cursor = None;
        self.phase = Phase::Exhausted;
    }
}

/// Iterator over one node's edges across every segment of a captured window.
pub struct MultiSegmentIterator<'a, W, A>
where
    W: SegmentWindow + ?Sized,
    A: SegmentEdgeAccessor + ?Sized + 'a,
{
    window: &'a W,
    accessor: &'a A,
    direction: Direction,
    traversal: Traversal<A::Cursor<'a>>,
}

impl<'a, W, A> MultiSegmentIterator<'a, W, A>
where
    W: SegmentWindow + ?Sized,
    A: SegmentEdgeAccessor + ?Sized + 'a,
{
    /// Creates an uninitialized iterator; call [`EdgeIterator::reset_for_node`] before use.
    pub fn new(window: &'a W, accessor: &'a A, direction: Direction) -> Self {
        Self {
            window,
            accessor,
            direction,
            traversal: Traversal::new(),
        }
    }

    /// Chronological iterator.
    pub fn forward(window: &'a W, accessor: &'a A) -> Self {
        Self::new(window, accessor, Direction::Forward)
    }

    /// Reverse-chronological iterator.
    pub fn reverse(window: &'a W, accessor: &'a A) -> Self {
        Self::new(window, accessor, Direction::Reverse)
    }

    /// Direction this iterator walks segments in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Node set by the last reset, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self.traversal.phase {
            Phase::Uninitialized => None,
            _ => Some(self.traversal.node),
        }
    }

    /// Window captured by the last reset, if any.
    pub fn captured_window(&self) -> Option<SegmentRange> {
        match self.traversal.phase {
            Phase::Uninitialized => None,
            _ => Some(self.traversal.range),
        }
    }

    /// Current traversal state.
    pub fn state(&self) -> TraversalState {
        match self.traversal.phase {
            Phase::Uninitialized => TraversalState::Uninitialized,
            Phase::Positioned => TraversalState::Positioned(self.traversal.current),
            Phase::Exhausted => TraversalState::Exhausted,
        }
    }

    fn fetch(&mut self, segment: SegmentId) -> Result<()> {
        let accessor: &'a A = self.accessor;
        match accessor.node_edges(segment, self.traversal.node) {
            Ok(cursor) => {
                self.traversal.current = segment;
                self.traversal.cursor = Some(cursor);
                Ok(())
            }
            Err(err) => {
                self.traversal.abort();
                Err(err)
            }
        }
    }

    /// Advances to the next segment holding at least one edge for the node.
    ///
    /// Returns false once the captured boundary is passed with nothing left.
    fn find_next_segment(&mut self) -> Result<bool> {
        while !self.traversal.cursor_has_next() {
            match self.traversal.step(self.direction) {
                Some(segment) => self.fetch(segment)?,
                None => {
                    self.traversal.abort();
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl<'a, W, A> EdgeIterator for MultiSegmentIterator<'a, W, A>
where
    W: SegmentWindow + ?Sized,
    A: SegmentEdgeAccessor + ?Sized + 'a,
{
    fn reset_for_node(&mut self, node: NodeId) -> Result<&mut Self> {
        let range = self.window.window();
        let start = match self.direction {
            Direction::Forward => range.oldest,
            Direction::Reverse => range.live,
        };
        self.traversal.cursor = None;
        self.traversal.node = node;
        self.traversal.range = range;
        self.traversal.current = start;
        self.traversal.phase = Phase::Positioned;
        self.fetch(start)?;
        self.find_next_segment()?;
        Ok(self)
    }

    fn has_next(&mut self) -> Result<bool> {
        match self.traversal.phase {
            Phase::Positioned => self.find_next_segment(),
            Phase::Uninitialized | Phase::Exhausted => Ok(false),
        }
    }

    fn next_edge(&mut self) -> Result<NodeId> {
        if !self.has_next()? {
            return Err(GraphError::ExhaustedIteration);
        }
        let Some(cursor) = self.traversal.cursor.as_mut() else {
            return Err(GraphError::ExhaustedIteration);
        };
        let edge = cursor.next_edge();
        if edge.is_err() {
            self.traversal.abort();
        }
        edge
    }
}

impl<'a, W, A> Iterator for MultiSegmentIterator<'a, W, A>
where
    W: SegmentWindow + ?Sized,
    A: SegmentEdgeAccessor + ?Sized + 'a,
{
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_edge()),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

//! The segment chain: a rolling window of segments with a single writer.
//!
//! Segments live in a ring of pre-allocated slots. The writer appends to the
//! live segment, seals it on rollover, and advances `oldest` to evict. Both
//! boundaries are published with release stores and only ever move forward.
//!
//! Eviction is logical: a segment's slot is recycled only when the ring wraps
//! back to it, `reclaim_lag` rollovers after the segment left the window. An
//! iterator that captured an older window can keep reading an evicted segment
//! until then; past that point its reads fail with
//! [`GraphError::InvalidSegmentReference`] instead of returning foreign edges.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::accessor::{SegmentEdgeAccessor, SegmentRange, SegmentWindow};
use super::iter::{Direction, MultiSegmentIterator};
use super::metrics::{default_metrics, ChainMetrics};
use super::options::ChainOptions;
use super::segment::{Segment, SegmentEdges};
use crate::types::{GraphError, NodeId, Result, SegmentId, SegmentState};

/// Cross-segment iterator over a [`SegmentChain`].
pub type ChainIterator<'a> = MultiSegmentIterator<'a, SegmentChain, SegmentChain>;

/// Published window boundaries.
pub(crate) struct Boundaries {
    oldest: AtomicU64,
    live: AtomicU64,
    /// Nanoseconds after `epoch` at which the live segment opened.
    live_opened: AtomicU64,
    epoch: Instant,
}

impl Boundaries {
    pub(crate) fn new() -> Self {
        Self {
            oldest: AtomicU64::new(0),
            live: AtomicU64::new(0),
            live_opened: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    fn mark_live_opened(&self) {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.live_opened.store(nanos, Ordering::Relaxed);
    }

    fn live_age(&self) -> Duration {
        let opened = Duration::from_nanos(self.live_opened.load(Ordering::Relaxed));
        self.epoch.elapsed().saturating_sub(opened)
    }

    pub(crate) fn oldest(&self) -> SegmentId {
        SegmentId(self.oldest.load(Ordering::Acquire))
    }

    pub(crate) fn live(&self) -> SegmentId {
        SegmentId(self.live.load(Ordering::Acquire))
    }

    pub(crate) fn invalid(&self, segment: SegmentId) -> GraphError {
        GraphError::InvalidSegmentReference {
            segment,
            oldest: self.oldest(),
            live: self.live(),
        }
    }
}

/// Point-in-time summary of the chain.
///
/// Counters are read without coordination and may be slightly stale while
/// the writer is active.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChainStats {
    /// Oldest retained segment id.
    pub oldest_segment: u64,
    /// Live segment id.
    pub live_segment: u64,
    /// Number of retained segments.
    pub retained_segments: u64,
    /// Edges held by retained segments.
    pub retained_edges: u64,
    /// Edges in the live segment.
    pub live_edges: u64,
    /// Distinct left nodes in the live segment.
    pub live_nodes: u64,
}

/// Rolling window of segments.
///
/// Shared between one [`ChainWriter`] and any number of readers. Readers
/// never take locks; see the module docs for the reclamation policy.
pub struct SegmentChain {
    slots: Box<[Segment]>,
    bounds: Boundaries,
    writer_held: AtomicBool,
    options: ChainOptions,
    metrics: Arc<dyn ChainMetrics>,
}

impl SegmentChain {
    /// Creates a chain whose first live segment is `SegmentId(0)`.
    pub fn new(options: ChainOptions) -> Result<Self> {
        options.validate()?;
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        let slots: Box<[Segment]> = (0..options.ring_len())
            .map(|_| Segment::new(options.edges_per_segment))
            .collect();
        slots[0].reset(SegmentId(0));
        debug!(
            max_segments = options.max_segments,
            edges_per_segment = options.edges_per_segment,
            reclaim_lag = options.reclaim_lag,
            "segment chain created"
        );
        Ok(Self {
            slots,
            bounds: Boundaries::new(),
            writer_held: AtomicBool::new(false),
            options,
            metrics,
        })
    }

    /// Options the chain was created with.
    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Claims the single writer handle.
    ///
    /// Returns [`GraphError::WriterHeld`] while another handle is alive.
    pub fn acquire_writer(self: &Arc<Self>) -> Result<ChainWriter> {
        if self
            .writer_held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("segment chain writer already held");
            return Err(GraphError::WriterHeld);
        }
        Ok(ChainWriter {
            chain: Arc::clone(self),
            live: self.bounds.live(),
        })
    }

    /// Lifecycle state of `segment`, or `None` if it was never created.
    pub fn segment_state(&self, segment: SegmentId) -> Option<SegmentState> {
        let window = self.window();
        if segment > window.live {
            None
        } else if segment < window.oldest {
            Some(SegmentState::Evicted)
        } else if segment == window.live {
            Some(SegmentState::Live)
        } else {
            Some(SegmentState::Sealed)
        }
    }

    /// Number of edges `node` has across the current window.
    pub fn degree(&self, node: NodeId) -> Result<usize> {
        let window = self.window();
        let mut total = 0usize;
        for segment in window.ids() {
            let degree = self
                .slot(segment)
                .degree(segment, node)
                .ok_or_else(|| self.bounds.invalid(segment))?;
            total += degree as usize;
        }
        Ok(total)
    }

    /// Returns a point-in-time summary of the chain.
    pub fn stats(&self) -> ChainStats {
        self.stats_for(self.window())
    }

    /// Summarizes `window`, counting only slots that still hold their segment.
    fn stats_for(&self, window: SegmentRange) -> ChainStats {
        let held = |segment: SegmentId| {
            let slot = self.slot(segment);
            slot.holds(segment).then_some(slot)
        };
        let retained_edges = window
            .ids()
            .filter_map(held)
            .map(|slot| u64::from(slot.edge_count()))
            .sum();
        let (live_edges, live_nodes) = held(window.live)
            .map(|live| (u64::from(live.edge_count()), u64::from(live.node_count())))
            .unwrap_or_default();
        ChainStats {
            oldest_segment: window.oldest.0,
            live_segment: window.live.0,
            retained_segments: window.len(),
            retained_edges,
            live_edges,
            live_nodes,
        }
    }

    /// Uninitialized chronological iterator.
    pub fn forward_iter(&self) -> ChainIterator<'_> {
        MultiSegmentIterator::new(self, self, Direction::Forward)
    }

    /// Uninitialized reverse-chronological iterator.
    pub fn reverse_iter(&self) -> ChainIterator<'_> {
        MultiSegmentIterator::new(self, self, Direction::Reverse)
    }

    /// Iterator in `direction`.
    pub fn iter(&self, direction: Direction) -> ChainIterator<'_> {
        MultiSegmentIterator::new(self, self, direction)
    }

    fn slot(&self, segment: SegmentId) -> &Segment {
        &self.slots[(segment.0 % self.slots.len() as u64) as usize]
    }
}

impl SegmentWindow for SegmentChain {
    fn oldest_segment_id(&self) -> SegmentId {
        self.bounds.oldest()
    }

    fn live_segment_id(&self) -> SegmentId {
        self.bounds.live()
    }
}

impl SegmentEdgeAccessor for SegmentChain {
    type Cursor<'a> = SegmentEdges<'a>;

    fn node_edges(&self, segment: SegmentId, node: NodeId) -> Result<SegmentEdges<'_>> {
        if segment > self.bounds.live() {
            return Err(self.bounds.invalid(segment));
        }
        let cursor = self
            .slot(segment)
            .edges(segment, node, &self.bounds)
            .ok_or_else(|| self.bounds.invalid(segment))?;
        self.metrics.segment_fetch(cursor.is_empty());
        Ok(cursor)
    }
}

/// Exclusive handle for mutating a [`SegmentChain`].
///
/// All appends, rollovers and evictions go through this handle; dropping it
/// lets another writer be acquired.
pub struct ChainWriter {
    chain: Arc<SegmentChain>,
    live: SegmentId,
}

impl ChainWriter {
    /// Chain this writer mutates.
    pub fn chain(&self) -> &Arc<SegmentChain> {
        &self.chain
    }

    /// Segment currently receiving appends.
    pub fn live_segment_id(&self) -> SegmentId {
        self.live
    }

    /// Appends `left -> right` to the live segment and returns the segment it landed in.
    ///
    /// Rolls over first when the live segment is full or past `max_segment_age`.
    pub fn add_edge(&mut self, left: NodeId, right: NodeId) -> Result<SegmentId> {
        if !left.is_valid() {
            return Err(GraphError::Invalid("left node id is reserved"));
        }
        if self.live_expired() {
            self.rollover();
        }
        debug_assert!(!self.chain.slot(self.live).is_sealed());
        if !self.chain.slot(self.live).append(left, right) {
            self.rollover();
            if !self.chain.slot(self.live).append(left, right) {
                return Err(GraphError::Invalid("fresh segment rejected append"));
            }
        }
        self.chain.metrics.edge_appended();
        Ok(self.live)
    }

    /// Seals the live segment and opens the next one, evicting as needed.
    ///
    /// Returns the id of the new live segment.
    pub fn rollover(&mut self) -> SegmentId {
        let chain = &*self.chain;
        let sealed = self.live;
        let next = sealed.next();
        let max = chain.options.max_segments as u64;
        chain.slot(sealed).seal();

        // Free the target slot while keeping oldest <= live for readers.
        while next.0 - chain.bounds.oldest().0 + 1 > max && chain.bounds.oldest() < sealed {
            self.evict_one();
        }
        trace!(segment = next.0, "reclaiming segment slot");
        chain.slot(next).reset(next);
        chain.bounds.mark_live_opened();
        chain.bounds.live.store(next.0, Ordering::Release);
        // Only reached with a single-segment window.
        while next.0 - chain.bounds.oldest().0 + 1 > max {
            self.evict_one();
        }

        self.live = next;
        chain.metrics.segment_rolled();
        debug!(
            sealed = sealed.0,
            live = next.0,
            oldest = chain.bounds.oldest().0,
            "segment rollover"
        );
        next
    }

    /// Evicts the oldest retained segment and returns its id.
    ///
    /// The live segment cannot be evicted.
    pub fn evict_oldest(&mut self) -> Result<SegmentId> {
        if self.chain.bounds.oldest() >= self.live {
            return Err(GraphError::Invalid("cannot evict the live segment"));
        }
        Ok(self.evict_one())
    }

    fn evict_one(&self) -> SegmentId {
        let bounds = &self.chain.bounds;
        let evicted = bounds.oldest();
        bounds.oldest.store(evicted.next().0, Ordering::Release);
        self.chain.metrics.segment_evicted();
        debug!(segment = evicted.0, "segment evicted");
        evicted
    }

    fn live_expired(&self) -> bool {
        match self.chain.options.max_segment_age {
            Some(age) => {
                self.chain.bounds.live_age() >= age
                    && self.chain.slot(self.live).edge_count() > 0
            }
            None => false,
        }
    }
}

impl Drop for ChainWriter {
    fn drop(&mut self) {
        self.chain.writer_held.store(false, Ordering::Release);
    }
}

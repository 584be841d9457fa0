//! Fixed-capacity edge storage for one time window of the chain.
//!
//! A segment is an edge pool plus an open-addressing node index, both built
//! from atomic cells so the single writer can append while readers walk
//! sealed and live segments without locks. Edges of a node are linked in
//! append order; the node's degree is published last with a release store,
//! so a reader that acquires a degree sees every edge it counts.
//!
//! Slots are recycled by the chain. The segment generation works like a
//! seqlock: readers validate it after every read and report a reclaimed slot
//! instead of returning edges that belong to a newer segment.

use std::hash::Hasher;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};

use rustc_hash::FxHasher;

use super::accessor::EdgeCursor;
use super::chain::Boundaries;
use crate::types::{GraphError, NodeId, Result, SegmentId};

/// Pool pointers are stored as `offset + 1`; zero terminates a chain.
const NIL: u32 = 0;
const EMPTY_KEY: u64 = NodeId::RESERVED.0;
/// Generation of a slot that holds no segment or is being recycled.
const RECLAIMING: u64 = u64::MAX;

pub(crate) struct Segment {
    generation: AtomicU64,
    sealed: AtomicBool,
    edge_count: AtomicU32,
    node_count: AtomicU32,
    capacity: u32,
    mask: usize,
    keys: Box<[AtomicU64]>,
    heads: Box<[AtomicU32]>,
    tails: Box<[AtomicU32]>,
    degrees: Box<[AtomicU32]>,
    targets: Box<[AtomicU64]>,
    links: Box<[AtomicU32]>,
}

enum IndexSlot {
    Occupied(usize),
    Vacant(usize),
}

impl Segment {
    pub(crate) fn new(capacity: u32) -> Self {
        // At most one index entry per edge, so the index stays at most half full.
        let index_len = (capacity as usize * 2).next_power_of_two();
        Self {
            generation: AtomicU64::new(RECLAIMING),
            sealed: AtomicBool::new(false),
            edge_count: AtomicU32::new(0),
            node_count: AtomicU32::new(0),
            capacity,
            mask: index_len - 1,
            keys: (0..index_len).map(|_| AtomicU64::new(EMPTY_KEY)).collect(),
            heads: (0..index_len).map(|_| AtomicU32::new(NIL)).collect(),
            tails: (0..index_len).map(|_| AtomicU32::new(NIL)).collect(),
            degrees: (0..index_len).map(|_| AtomicU32::new(0)).collect(),
            targets: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            links: (0..capacity).map(|_| AtomicU32::new(NIL)).collect(),
        }
    }

    pub(crate) fn holds(&self, segment: SegmentId) -> bool {
        self.generation.load(Ordering::Acquire) == segment.0
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub(crate) fn edge_count(&self) -> u32 {
        self.edge_count.load(Ordering::Acquire)
    }

    pub(crate) fn node_count(&self) -> u32 {
        self.node_count.load(Ordering::Acquire)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.edge_count.load(Ordering::Relaxed) >= self.capacity
    }

    /// Recycles the slot for `segment`. Writer only.
    pub(crate) fn reset(&self, segment: SegmentId) {
        self.generation.store(RECLAIMING, Ordering::Relaxed);
        fence(Ordering::Release);
        if self.node_count.load(Ordering::Relaxed) > 0 {
            for (key, degree) in self.keys.iter().zip(self.degrees.iter()) {
                key.store(EMPTY_KEY, Ordering::Relaxed);
                degree.store(0, Ordering::Relaxed);
            }
        }
        self.edge_count.store(0, Ordering::Relaxed);
        self.node_count.store(0, Ordering::Relaxed);
        self.sealed.store(false, Ordering::Relaxed);
        self.generation.store(segment.0, Ordering::Release);
    }

    /// Marks the segment immutable. Writer only.
    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// Appends `left -> right`; returns false when the pool is full. Writer only.
    pub(crate) fn append(&self, left: NodeId, right: NodeId) -> bool {
        let pos = self.edge_count.load(Ordering::Relaxed);
        if pos >= self.capacity {
            return false;
        }
        let offset = pos as usize;
        let ptr = pos + 1;
        self.targets[offset].store(right.0, Ordering::Relaxed);
        self.links[offset].store(NIL, Ordering::Relaxed);

        let slot = match self.probe_for_insert(left) {
            IndexSlot::Occupied(slot) => {
                let tail = self.tails[slot].load(Ordering::Relaxed);
                self.links[(tail - 1) as usize].store(ptr, Ordering::Relaxed);
                slot
            }
            IndexSlot::Vacant(slot) => {
                self.heads[slot].store(ptr, Ordering::Relaxed);
                self.degrees[slot].store(0, Ordering::Relaxed);
                self.keys[slot].store(left.0, Ordering::Release);
                let nodes = self.node_count.load(Ordering::Relaxed);
                self.node_count.store(nodes + 1, Ordering::Release);
                slot
            }
        };
        self.tails[slot].store(ptr, Ordering::Relaxed);
        let degree = self.degrees[slot].load(Ordering::Relaxed);
        self.degrees[slot].store(degree + 1, Ordering::Release);
        self.edge_count.store(ptr, Ordering::Release);
        true
    }

    /// Published degree of `node`, or `None` if the slot no longer holds `segment`.
    pub(crate) fn degree(&self, segment: SegmentId, node: NodeId) -> Option<u32> {
        if !self.holds(segment) {
            return None;
        }
        let degree = self
            .find(node)
            .map(|slot| self.degrees[slot].load(Ordering::Acquire))
            .unwrap_or(0);
        self.validate(segment).then_some(degree)
    }

    /// Cursor over `node`'s edges as of now, or `None` if the slot was recycled.
    pub(crate) fn edges<'a>(
        &'a self,
        segment: SegmentId,
        node: NodeId,
        bounds: &'a Boundaries,
    ) -> Option<SegmentEdges<'a>> {
        if !self.holds(segment) {
            return None;
        }
        let (head, degree) = match self.find(node) {
            Some(slot) => {
                let degree = self.degrees[slot].load(Ordering::Acquire);
                (self.heads[slot].load(Ordering::Relaxed), degree)
            }
            None => (NIL, 0),
        };
        if !self.validate(segment) {
            return None;
        }
        Some(SegmentEdges {
            segment: self,
            bounds,
            id: segment,
            head,
            degree,
            next: head,
            remaining: degree,
        })
    }

    /// Re-checks the generation after a batch of relaxed reads.
    fn validate(&self, segment: SegmentId) -> bool {
        fence(Ordering::Acquire);
        self.generation.load(Ordering::Relaxed) == segment.0
    }

    fn home(&self, node: NodeId) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write_u64(node.0);
        hasher.finish() as usize & self.mask
    }

    fn find(&self, node: NodeId) -> Option<usize> {
        let mut slot = self.home(node);
        // Bounded: a reader racing a recycle may see a transiently crowded index.
        for _ in 0..=self.mask {
            match self.keys[slot].load(Ordering::Acquire) {
                key if key == node.0 => return Some(slot),
                EMPTY_KEY => return None,
                _ => slot = (slot + 1) & self.mask,
            }
        }
        None
    }

    fn probe_for_insert(&self, node: NodeId) -> IndexSlot {
        let mut slot = self.home(node);
        loop {
            match self.keys[slot].load(Ordering::Relaxed) {
                key if key == node.0 => return IndexSlot::Occupied(slot),
                EMPTY_KEY => return IndexSlot::Vacant(slot),
                _ => slot = (slot + 1) & self.mask,
            }
        }
    }
}

/// Restartable cursor over one node's edges inside one segment.
///
/// Yields edges in append order. The degree is captured at creation, so
/// edges appended to a live segment afterwards are not observed.
pub struct SegmentEdges<'a> {
    segment: &'a Segment,
    bounds: &'a Boundaries,
    id: SegmentId,
    head: u32,
    degree: u32,
    next: u32,
    remaining: u32,
}

impl<'a> SegmentEdges<'a> {
    /// Segment this cursor reads from.
    pub fn segment_id(&self) -> SegmentId {
        self.id
    }

    /// Number of edges captured at creation.
    pub fn len(&self) -> usize {
        self.degree as usize
    }

    /// Returns true if the node had no edges in this segment.
    pub fn is_empty(&self) -> bool {
        self.degree == 0
    }

    fn reclaimed(&mut self) -> GraphError {
        self.remaining = 0;
        self.bounds.invalid(self.id)
    }
}

impl<'a> EdgeCursor for SegmentEdges<'a> {
    fn has_next(&self) -> bool {
        self.remaining > 0
    }

    fn next_edge(&mut self) -> Result<NodeId> {
        if self.remaining == 0 {
            return Err(GraphError::ExhaustedIteration);
        }
        if self.next == NIL {
            return Err(self.reclaimed());
        }
        let offset = (self.next - 1) as usize;
        let target = self.segment.targets[offset].load(Ordering::Relaxed);
        let link = if self.remaining > 1 {
            self.segment.links[offset].load(Ordering::Relaxed)
        } else {
            NIL
        };
        if !self.segment.validate(self.id) {
            return Err(self.reclaimed());
        }
        self.next = link;
        self.remaining -= 1;
        Ok(NodeId(target))
    }

    fn restart(&mut self) {
        self.next = self.head;
        self.remaining = self.degree;
    }
}

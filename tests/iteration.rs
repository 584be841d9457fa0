//! Cross-segment traversal over a real chain.

use std::sync::Arc;

use bipartite_segments::storage::{ChainIterator, TraversalState};
use bipartite_segments::{
    ChainOptions, ChainWriter, Direction, EdgeIterator, GraphError, NodeId, Result,
    SegmentChain, SegmentId, SegmentState, SegmentWindow,
};

const A: NodeId = NodeId(1);
const B: NodeId = NodeId(2);

fn setup(max_segments: usize, reclaim_lag: usize) -> Result<(Arc<SegmentChain>, ChainWriter)> {
    let opts = ChainOptions::new()
        .max_segments(max_segments)
        .edges_per_segment(16)
        .reclaim_lag(reclaim_lag);
    let chain = Arc::new(SegmentChain::new(opts)?);
    let writer = chain.acquire_writer()?;
    Ok((chain, writer))
}

fn drain(iter: &mut ChainIterator<'_>) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    while iter.has_next()? {
        out.push(iter.next_edge()?.0);
    }
    Ok(out)
}

/// S0: A -> [1, 2], S1: A -> [], S2: A -> [3] (live).
fn three_segments() -> Result<(Arc<SegmentChain>, ChainWriter)> {
    let (chain, mut writer) = setup(8, 2)?;
    writer.add_edge(A, NodeId(1))?;
    writer.add_edge(A, NodeId(2))?;
    writer.rollover();
    writer.add_edge(B, NodeId(50))?;
    writer.rollover();
    writer.add_edge(A, NodeId(3))?;
    Ok((chain, writer))
}

#[test]
fn forward_is_chronological_across_segments() -> Result<()> {
    let (chain, _writer) = three_segments()?;
    let mut iter = chain.forward_iter();
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn reverse_visits_newest_segment_first() -> Result<()> {
    let (chain, _writer) = three_segments()?;
    let mut iter = chain.reverse_iter();
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![3, 1, 2]);
    Ok(())
}

#[test]
fn node_without_edges_is_immediately_exhausted() -> Result<()> {
    let (chain, _writer) = three_segments()?;
    for direction in [Direction::Forward, Direction::Reverse] {
        let mut iter = chain.iter(direction);
        iter.reset_for_node(NodeId(404))?;
        assert!(!iter.has_next()?);
        assert_eq!(iter.next_edge(), Err(GraphError::ExhaustedIteration));
    }
    Ok(())
}

#[test]
fn one_iterator_serves_many_nodes() -> Result<()> {
    let (chain, _writer) = three_segments()?;
    let mut iter = chain.forward_iter();
    iter.reset_for_node(A)?;
    assert_eq!(iter.next_edge()?, NodeId(1));
    iter.reset_for_node(B)?;
    assert_eq!(iter.state(), TraversalState::Positioned(SegmentId(1)));
    assert_eq!(drain(&mut iter)?, vec![50]);
    iter.reset_for_node(A)?;
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn captured_window_ignores_later_rollovers() -> Result<()> {
    let (chain, mut writer) = three_segments()?;
    let mut iter = chain.forward_iter();
    iter.reset_for_node(A)?;
    writer.rollover();
    writer.add_edge(A, NodeId(4))?;
    assert_eq!(drain(&mut iter)?, vec![1, 2, 3]);
    assert_eq!(
        iter.captured_window().map(|w| w.live),
        Some(SegmentId(2))
    );
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn in_flight_reverse_iterator_reaches_evicted_segment() -> Result<()> {
    let (chain, mut writer) = three_segments()?;
    let mut iter = chain.reverse_iter();
    iter.reset_for_node(A)?;
    assert_eq!(iter.next_edge()?, NodeId(3));

    assert_eq!(writer.evict_oldest()?, SegmentId(0));
    assert_eq!(chain.oldest_segment_id(), SegmentId(1));
    assert_eq!(chain.segment_state(SegmentId(0)), Some(SegmentState::Evicted));

    assert_eq!(drain(&mut iter)?, vec![1, 2]);

    // A fresh traversal honours the new boundary.
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![3]);
    Ok(())
}

#[test]
fn reclaimed_segment_aborts_traversal_loudly() -> Result<()> {
    let (chain, mut writer) = setup(2, 0)?;
    writer.add_edge(A, NodeId(1))?;
    writer.rollover();
    writer.add_edge(A, NodeId(2))?;

    let mut iter = chain.forward_iter();
    iter.reset_for_node(A)?;
    // Two rollovers with no lag recycle both captured slots.
    writer.rollover();
    writer.rollover();
    writer.add_edge(A, NodeId(3))?;

    assert!(iter.has_next()?);
    assert!(matches!(
        iter.next_edge(),
        Err(GraphError::InvalidSegmentReference { segment: SegmentId(0), .. })
    ));
    assert_eq!(iter.state(), TraversalState::Exhausted);
    assert!(!iter.has_next()?);
    Ok(())
}

#[test]
fn appends_to_live_segment_are_eventually_visible() -> Result<()> {
    let (chain, mut writer) = setup(4, 2)?;
    writer.add_edge(A, NodeId(1))?;
    let mut iter = chain.forward_iter();
    iter.reset_for_node(A)?;
    writer.add_edge(A, NodeId(2))?;
    assert_eq!(drain(&mut iter)?, vec![1]);
    iter.reset_for_node(A)?;
    assert_eq!(drain(&mut iter)?, vec![1, 2]);
    Ok(())
}

#[test]
fn degree_sums_over_window() -> Result<()> {
    let (chain, mut writer) = three_segments()?;
    assert_eq!(chain.degree(A)?, 3);
    writer.evict_oldest()?;
    assert_eq!(chain.degree(A)?, 1);
    assert_eq!(chain.degree(NodeId(404))?, 0);
    Ok(())
}

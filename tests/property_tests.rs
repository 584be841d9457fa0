use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bipartite_segments::storage::ChainIterator;
use bipartite_segments::{
    ChainOptions, EdgeIterator, NodeId, SegmentChain, SegmentId, SegmentWindow,
};
use proptest::prelude::*;

const NODES: u64 = 4;

#[derive(Debug, Clone)]
enum Operation {
    AddEdge { left: u64, right: u64 },
    Rollover,
    EvictOldest,
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        6 => (0..NODES, any::<u32>()).prop_map(|(left, right)| Operation::AddEdge {
            left,
            right: u64::from(right),
        }),
        1 => Just(Operation::Rollover),
        1 => Just(Operation::EvictOldest),
    ]
}

/// Edges per (segment, node) in append order, as the writer reported them.
type Model = HashMap<(SegmentId, u64), Vec<u64>>;

fn build(
    ops: &[Operation],
    max_segments: usize,
    edges_per_segment: u32,
) -> (Arc<SegmentChain>, Model) {
    let opts = ChainOptions::new()
        .max_segments(max_segments)
        .edges_per_segment(edges_per_segment)
        .reclaim_lag(1);
    let chain = Arc::new(SegmentChain::new(opts).unwrap());
    let mut writer = chain.acquire_writer().unwrap();
    let mut model = Model::new();
    for op in ops {
        match *op {
            Operation::AddEdge { left, right } => {
                let segment = writer.add_edge(NodeId(left), NodeId(right)).unwrap();
                model.entry((segment, left)).or_default().push(right);
            }
            Operation::Rollover => {
                writer.rollover();
            }
            Operation::EvictOldest => {
                let _ = writer.evict_oldest();
            }
        }
    }
    (chain, model)
}

fn expected(chain: &SegmentChain, model: &Model, node: u64, reverse: bool) -> Vec<u64> {
    let window = chain.window();
    let ids: Vec<SegmentId> = if reverse {
        window.ids().rev().collect()
    } else {
        window.ids().collect()
    };
    ids.into_iter()
        .flat_map(|segment| model.get(&(segment, node)).cloned().unwrap_or_default())
        .collect()
}

fn drain(iter: &mut ChainIterator<'_>, node: u64) -> Vec<u64> {
    iter.reset_for_node(NodeId(node))
        .unwrap()
        .map(|edge| edge.unwrap().0)
        .collect()
}

fn counts(edges: &[u64]) -> BTreeMap<u64, usize> {
    let mut out = BTreeMap::new();
    for edge in edges {
        *out.entry(*edge).or_insert(0) += 1;
    }
    out
}

proptest! {
    #[test]
    fn prop_iterators_match_model(
        ops in prop::collection::vec(arb_operation(), 1..200),
        max_segments in 1usize..5,
        edges_per_segment in 1u32..8,
    ) {
        let (chain, model) = build(&ops, max_segments, edges_per_segment);
        let mut forward = chain.forward_iter();
        let mut reverse = chain.reverse_iter();
        for node in 0..NODES {
            prop_assert_eq!(drain(&mut forward, node), expected(&chain, &model, node, false));
            prop_assert_eq!(drain(&mut reverse, node), expected(&chain, &model, node, true));
        }
    }

    #[test]
    fn prop_forward_and_reverse_return_same_edges(
        ops in prop::collection::vec(arb_operation(), 1..200),
    ) {
        let (chain, _) = build(&ops, 3, 4);
        let mut forward = chain.forward_iter();
        let mut reverse = chain.reverse_iter();
        for node in 0..NODES {
            let fwd = drain(&mut forward, node);
            let rev = drain(&mut reverse, node);
            prop_assert_eq!(fwd.len(), chain.degree(NodeId(node)).unwrap());
            prop_assert_eq!(counts(&fwd), counts(&rev));
        }
    }

    #[test]
    fn prop_double_reset_is_idempotent(
        ops in prop::collection::vec(arb_operation(), 1..120),
        node in 0..NODES,
    ) {
        let (chain, _) = build(&ops, 3, 4);
        for mut iter in [chain.forward_iter(), chain.reverse_iter()] {
            let once = drain(&mut iter, node);
            iter.reset_for_node(NodeId(node)).unwrap();
            let twice = drain(&mut iter, node);
            prop_assert_eq!(once, twice);
        }
    }
}

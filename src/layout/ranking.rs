use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{trace, warn};

use crate::ir::{EdgeIdx, Graph, NodeIdx};

use super::LayoutWarning;

#[derive(Debug, Default)]
pub(super) struct RankAssignment {
    pub(super) ranks: HashMap<NodeIdx, usize>,
    pub(super) warnings: Vec<LayoutWarning>,
}

impl RankAssignment {
    pub(super) fn layer_count(&self) -> usize {
        self.ranks.values().max().map_or(0, |max| max + 1)
    }
}

/// Longest-distance ranks over the graph with its cycles broken first.
///
/// Edges in `feedback` (labelled returns) never count. A depth-first walk
/// then drops every remaining edge that closes a cycle, so what is left is
/// acyclic and gets ranked in topological order: a node sits one layer below
/// its deepest kept predecessor.
pub(super) fn assign_ranks(graph: &Graph, feedback: &HashSet<EdgeIdx>) -> RankAssignment {
    let mut out = RankAssignment::default();
    if graph.node_count() == 0 {
        return out;
    }

    let back_edges = break_cycles(graph, feedback, &mut out.warnings);
    let kept = |edge: EdgeIdx| !feedback.contains(&edge) && !back_edges.contains(&edge);

    let mut pending: HashMap<NodeIdx, usize> = HashMap::new();
    for (idx, edge) in graph.edges() {
        if kept(idx) {
            *pending.entry(edge.target).or_default() += 1;
        }
    }
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();
    for (idx, _) in graph.nodes() {
        if !pending.contains_key(&idx) {
            out.ranks.insert(idx, 0);
            queue.push_back(idx);
        }
    }

    while let Some(node) = queue.pop_front() {
        let rank = out.ranks.get(&node).copied().unwrap_or(0);
        let Some(outgoing) = graph.node(node).map(|n| n.outgoing.as_slice()) else {
            continue;
        };
        for &edge_idx in outgoing {
            if !kept(edge_idx) {
                continue;
            }
            let Some(edge) = graph.edge(edge_idx) else {
                continue;
            };
            let entry = out.ranks.entry(edge.target).or_insert(0);
            *entry = (*entry).max(rank + 1);
            if let Some(left) = pending.get_mut(&edge.target) {
                *left -= 1;
                if *left == 0 {
                    queue.push_back(edge.target);
                }
            }
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Open,
    Done,
}

/// Edges that point back into the current depth-first path.
///
/// The walk starts from nodes without incoming edges. Components that have
/// none start from a node whose only incoming edges are feedback edges, or
/// failing that the first unvisited node, and report a `NoRootFallback`.
fn break_cycles(
    graph: &Graph,
    feedback: &HashSet<EdgeIdx>,
    warnings: &mut Vec<LayoutWarning>,
) -> HashSet<EdgeIdx> {
    let only_feedback_in =
        |incoming: &[EdgeIdx]| incoming.iter().all(|edge| feedback.contains(edge));
    let roots = graph.nodes().filter(|(_, node)| node.incoming.is_empty());
    let soft_roots = graph
        .nodes()
        .filter(|(_, node)| !node.incoming.is_empty() && only_feedback_in(&node.incoming));
    let starts: Vec<(NodeIdx, bool)> = roots
        .map(|(idx, _)| (idx, true))
        .chain(soft_roots.map(|(idx, _)| (idx, false)))
        .chain(graph.nodes().map(|(idx, _)| (idx, false)))
        .collect();

    let mut visits: HashMap<NodeIdx, Visit> = HashMap::new();
    let mut back_edges = HashSet::new();
    for (start, is_root) in starts {
        if visits.contains_key(&start) {
            continue;
        }
        if !is_root {
            let id = graph.node(start).map(|n| n.id.clone()).unwrap_or_default();
            warn!(node = %id, "no root node available; falling back to an arbitrary root");
            warnings.push(LayoutWarning::NoRootFallback { node_id: id });
        }

        visits.insert(start, Visit::Open);
        let mut stack: Vec<(NodeIdx, usize)> = vec![(start, 0)];
        while let Some(&(node, next)) = stack.last() {
            let outgoing = graph.node(node).map_or(&[][..], |n| n.outgoing.as_slice());
            let Some(&edge_idx) = outgoing.get(next) else {
                visits.insert(node, Visit::Done);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if feedback.contains(&edge_idx) {
                continue;
            }
            let Some(edge) = graph.edge(edge_idx) else {
                continue;
            };
            match visits.get(&edge.target) {
                Some(Visit::Open) => {
                    trace!(edge = %edge.id, "edge closes a cycle; ignored for ranking");
                    back_edges.insert(edge_idx);
                }
                Some(Visit::Done) => {}
                None => {
                    visits.insert(edge.target, Visit::Open);
                    stack.push((edge.target, 0));
                }
            }
        }
    }
    back_edges
}

/// Median-heuristic crossing reduction. Each pass sweeps down (ordering by
/// predecessors) and then up (ordering by successors). Nodes without a placed
/// neighbor sink to the end of their layer, keeping their relative order.
pub(super) fn order_rank_nodes(rank_nodes: &mut [Vec<NodeIdx>], graph: &Graph, passes: usize) {
    if rank_nodes.len() <= 1 || passes == 0 {
        return;
    }
    let mut incoming: HashMap<NodeIdx, Vec<NodeIdx>> = HashMap::new();
    let mut outgoing: HashMap<NodeIdx, Vec<NodeIdx>> = HashMap::new();
    for (_, edge) in graph.edges() {
        outgoing.entry(edge.source).or_default().push(edge.target);
        incoming.entry(edge.target).or_default().push(edge.source);
    }

    let mut positions: HashMap<NodeIdx, usize> = HashMap::new();
    let update_positions = |rank_nodes: &[Vec<NodeIdx>], positions: &mut HashMap<NodeIdx, usize>| {
        positions.clear();
        for bucket in rank_nodes {
            for (idx, node) in bucket.iter().enumerate() {
                positions.insert(*node, idx);
            }
        }
    };
    update_positions(rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<NodeIdx>,
                       neighbors: &HashMap<NodeIdx, Vec<NodeIdx>>,
                       positions: &HashMap<NodeIdx, usize>| {
        let scores: HashMap<NodeIdx, Option<f32>> = bucket
            .iter()
            .map(|node| (*node, median_position(*node, neighbors, positions)))
            .collect();
        // `sort_by` is stable, so ties keep the current order.
        bucket.sort_by(|a, b| {
            match (scores.get(a).copied().flatten(), scores.get(b).copied().flatten()) {
                (Some(a_score), Some(b_score)) => {
                    a_score.partial_cmp(&b_score).unwrap_or(Ordering::Equal)
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    };

    for _ in 0..passes {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len().saturating_sub(1)).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(rank_nodes, &mut positions);
        }
    }
}

/// Median in-layer position of `node_id`'s neighbors that are currently
/// placed in some layer, or `None` when it has none.
pub(super) fn median_position(
    node_id: NodeIdx,
    neighbors: &HashMap<NodeIdx, Vec<NodeIdx>>,
    positions: &HashMap<NodeIdx, usize>,
) -> Option<f32> {
    let list = neighbors.get(&node_id)?;
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor))
        .map(|pos| *pos as f32)
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) * 0.5)
    }
}

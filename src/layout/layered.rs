//! Layered (rank-based) placement: ranks, per-layer ordering, coordinates.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::geometry::Point;
use crate::ir::{EdgeIdx, Graph, NodeIdx};

use super::Placement;
use super::ranking::{assign_ranks, order_rank_nodes};
use super::routing::LoopDetector;

pub(super) fn layout(graph: &Graph, config: &LayoutConfig) -> Placement {
    let mut placement = Placement::default();
    if graph.node_count() == 0 {
        return placement;
    }

    // Labelled returns point back up the flow; they must not drag their
    // targets down a layer.
    let detector = LoopDetector::new(&config.routing, config.direction);
    let feedback: HashSet<EdgeIdx> = graph
        .edges()
        .filter(|(_, edge)| detector.label_marks_loop(edge.label.as_deref()))
        .map(|(idx, _)| idx)
        .collect();
    let ranks = assign_ranks(graph, &feedback);
    let layer_count = ranks.layer_count();

    // Manual nodes keep their rank (their neighbors depend on it) but never
    // take a slot in a layer.
    let mut rank_nodes: Vec<Vec<NodeIdx>> = vec![Vec::new(); layer_count];
    for (idx, node) in graph.nodes() {
        if node.manual_position {
            continue;
        }
        if let Some(rank) = ranks.ranks.get(&idx) {
            rank_nodes[*rank].push(idx);
        }
    }

    order_rank_nodes(&mut rank_nodes, graph, config.order_passes);

    let horizontal = config.direction.is_horizontal();
    for (rank, bucket) in rank_nodes.iter().enumerate() {
        let main = rank as f32 * config.level_gap;
        let sizes: Vec<f32> = bucket
            .iter()
            .filter_map(|idx| graph.node(*idx))
            .map(|node| if horizontal { node.height } else { node.width })
            .collect();
        let total: f32 =
            sizes.iter().sum::<f32>() + config.node_gap * sizes.len().saturating_sub(1) as f32;
        let mut cursor = -total / 2.0;
        for (idx, size) in bucket.iter().zip(sizes.iter()) {
            let cross = cursor + size / 2.0;
            cursor += size + config.node_gap;
            let center: Point = if horizontal { (main, cross) } else { (cross, main) };
            placement.positions.insert(*idx, center);
        }
    }

    debug!(
        layers = layer_count,
        nodes = graph.node_count(),
        passes = config.order_passes,
        "layered layout complete"
    );

    placement.ranks = ranks.ranks;
    placement.warnings = ranks.warnings;
    placement
}

/// Layer buckets in final order, for callers that want the ordering itself.
pub fn layer_order(graph: &Graph, config: &LayoutConfig) -> Vec<Vec<String>> {
    let placement = layout(graph, config);
    let mut layers: HashMap<usize, Vec<(f32, String)>> = HashMap::new();
    for (idx, rank) in &placement.ranks {
        let (Some(node), Some(pos)) = (graph.node(*idx), placement.positions.get(idx)) else {
            continue;
        };
        let cross = if config.direction.is_horizontal() { pos.1 } else { pos.0 };
        layers.entry(*rank).or_default().push((cross, node.id.clone()));
    }
    let count = layers.keys().max().map_or(0, |max| max + 1);
    (0..count)
        .map(|rank| {
            let mut bucket = layers.remove(&rank).unwrap_or_default();
            bucket.sort_by(|a, b| a.0.total_cmp(&b.0));
            bucket.into_iter().map(|(_, id)| id).collect()
        })
        .collect()
}

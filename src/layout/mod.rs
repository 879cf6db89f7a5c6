mod channels;
mod force;
mod label_placement;
pub mod layered;
mod ports;
mod ranking;
pub mod routing;
pub mod slots;
mod types;

pub use label_placement::place_label;
pub use ports::{SideOccupant, fan_out_offsets};
pub use types::*;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{LayoutAlgorithm, LayoutConfig};
use crate::geometry::{Point, Rect, path_bend_count, path_length};
use crate::ir::{EdgeIdx, Graph, NodeIdx};

use label_placement::resolve_label_positions;
use routing::{LoopDetector, OrthogonalRouter, RouteRequest};
use slots::{SlotAllocator, SlotRequest};

/// Node centers chosen by one of the engines. Manual nodes never appear in
/// `positions`.
#[derive(Debug, Default)]
struct Placement {
    positions: HashMap<NodeIdx, Point>,
    ranks: HashMap<NodeIdx, usize>,
    warnings: Vec<LayoutWarning>,
}

/// One full layout and routing pass with fresh occupancy and path caches.
/// The graph is not modified.
pub fn compute_layout(graph: &Graph, config: &LayoutConfig) -> Layout {
    let mut allocator = SlotAllocator::new();
    let mut router = OrthogonalRouter::new(config.routing.clone());
    run_pass(graph, config, &mut allocator, &mut router)
}

struct EdgePlan<'a> {
    idx: EdgeIdx,
    id: &'a str,
    label: Option<&'a str>,
    source: usize,
    target: usize,
    is_loop: bool,
}

pub(crate) fn run_pass(
    graph: &Graph,
    config: &LayoutConfig,
    allocator: &mut SlotAllocator,
    router: &mut OrthogonalRouter,
) -> Layout {
    allocator.clear();
    router.clear();

    let mut placement = match config.algorithm {
        LayoutAlgorithm::Layered => layered::layout(graph, config),
        LayoutAlgorithm::Force => force::layout(graph, config),
    };
    let mut warnings = std::mem::take(&mut placement.warnings);

    let mut nodes: Vec<NodeLayout> = Vec::with_capacity(graph.node_count());
    let mut node_slot: HashMap<NodeIdx, usize> = HashMap::new();
    for (idx, node) in graph.nodes() {
        let center = if node.manual_position {
            node.position.unwrap_or_else(|| {
                warn!(node = %node.id, "manual node has no position; placing at origin");
                warnings.push(LayoutWarning::MissingPosition {
                    node_id: node.id.clone(),
                });
                (0.0, 0.0)
            })
        } else {
            placement
                .positions
                .get(&idx)
                .copied()
                .or(node.position)
                .unwrap_or((0.0, 0.0))
        };
        node_slot.insert(idx, nodes.len());
        nodes.push(NodeLayout {
            idx,
            id: node.id.clone(),
            shape: node.shape,
            x: center.0,
            y: center.1,
            width: node.width,
            height: node.height,
            manual: node.manual_position,
            rank: placement.ranks.get(&idx).copied(),
        });
    }
    let rects: Vec<Rect> = nodes.iter().map(NodeLayout::bounds).collect();

    let detector = LoopDetector::new(&config.routing, config.direction);
    let mut plans: Vec<EdgePlan<'_>> = Vec::with_capacity(graph.edge_count());
    for (idx, edge) in graph.edges() {
        let (Some(&source), Some(&target)) = (node_slot.get(&edge.source), node_slot.get(&edge.target))
        else {
            continue;
        };
        let label = edge.label.as_deref();
        plans.push(EdgePlan {
            idx,
            id: &edge.id,
            label,
            source,
            target,
            is_loop: detector.is_loop(label, &rects[source], &rects[target]),
        });
    }
    // Forward edges claim slots and get routed first so loops can clear them.
    plans.sort_by_key(|plan| (plan.is_loop, plan.idx));

    let mut sides = Vec::with_capacity(plans.len());
    for plan in &plans {
        let request = SlotRequest {
            edge: plan.idx,
            edge_id: plan.id,
            source: &nodes[plan.source],
            target: &nodes[plan.target],
            direction: config.direction,
            is_loop: plan.is_loop,
        };
        sides.push(allocator.allocate(&request, &mut warnings));
    }

    let offset_of = |node: &NodeLayout, side: EdgeSide, edge: EdgeIdx| {
        allocator
            .fan_out(node, side)
            .into_iter()
            .find(|(candidate, _)| *candidate == edge)
            .map_or(0.0, |(_, offset)| offset)
    };

    let mut edges: Vec<EdgeLayout> = Vec::with_capacity(plans.len());
    for (plan, (source_slot, target_slot)) in plans.iter().zip(sides) {
        let from = &nodes[plan.source];
        let to = &nodes[plan.target];
        let source_offset = offset_of(from, source_slot.side, plan.idx);
        let target_offset = offset_of(to, target_slot.side, plan.idx);
        let obstacles: Vec<Rect> = rects
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != plan.source && *i != plan.target)
            .map(|(_, rect)| *rect)
            .collect();
        let request = RouteRequest {
            edge_id: plan.id,
            source: from
                .shape
                .connection_point(&rects[plan.source], source_slot.side, source_offset),
            target: to
                .shape
                .connection_point(&rects[plan.target], target_slot.side, target_offset),
            source_side: source_slot.side,
            target_side: target_slot.side,
            source_bounds: rects[plan.source],
            target_bounds: rects[plan.target],
            is_loop: plan.is_loop,
        };
        let route = router.route(&request, &obstacles, &mut warnings);
        edges.push(EdgeLayout {
            idx: plan.idx,
            id: plan.id.to_string(),
            from: from.id.clone(),
            to: to.id.clone(),
            label: plan.label.map(str::to_string),
            bends: path_bend_count(&route.points),
            length: path_length(&route.points),
            arrow_angle: route.arrival_angle,
            points: route.points,
            label_anchor: None,
            source_side: source_slot.side,
            target_side: target_slot.side,
            source_offset,
            target_offset,
            is_loop: plan.is_loop,
        });
    }
    edges.sort_by_key(|edge| edge.idx);
    resolve_label_positions(&mut edges, config.label.offset);

    let bounds = layout_bounds(&rects, &edges);
    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        loops = edges.iter().filter(|edge| edge.is_loop).count(),
        warnings = warnings.len(),
        "layout pass complete"
    );
    Layout {
        nodes,
        edges,
        bounds,
        warnings,
    }
}

fn layout_bounds(rects: &[Rect], edges: &[EdgeLayout]) -> Rect {
    let points = edges.iter().flat_map(|edge| edge.points.iter().copied());
    let mut bounds: Option<Rect> = None;
    for rect in rects
        .iter()
        .copied()
        .chain(points.map(|p| Rect::new(p.0, p.1, 0.0, 0.0)))
    {
        bounds = Some(match bounds {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }
    bounds.unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
}

//! Long-lived layout session: owns the graph, the slot occupancy table and
//! the router's path cache across repeated passes.

use std::collections::HashMap;

use tracing::debug;

use crate::config::LayoutConfig;
use crate::geometry::Point;
use crate::ir::{Edge, Graph, GraphError, Node, NodeIdx};
use crate::layout::routing::OrthogonalRouter;
use crate::layout::slots::SlotAllocator;
use crate::layout::{Layout, run_pass};

#[derive(Debug, Clone)]
pub struct Engine {
    graph: Graph,
    config: LayoutConfig,
    allocator: SlotAllocator,
    router: OrthogonalRouter,
    /// Positions movable nodes came in with, restored before every pass.
    seeds: HashMap<NodeIdx, Option<Point>>,
}

impl Engine {
    pub fn new(graph: Graph, config: LayoutConfig) -> Self {
        let router = OrthogonalRouter::new(config.routing.clone());
        let seeds = graph
            .nodes()
            .filter(|(_, node)| !node.manual_position)
            .map(|(idx, node)| (idx, node.position))
            .collect();
        Self {
            graph,
            config,
            allocator: SlotAllocator::new(),
            router,
            seeds,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn allocator(&self) -> &SlotAllocator {
        &self.allocator
    }

    pub fn set_config(&mut self, config: LayoutConfig) {
        self.router.set_config(config.routing.clone());
        self.config = config;
    }

    /// Full re-layout and re-route. Every pass starts from the positions the
    /// graph came in with, so repeated runs agree; the result is then written
    /// back onto the non-manual nodes.
    pub fn run(&mut self) -> Layout {
        for (idx, seed) in &self.seeds {
            if let Some(node) = self.graph.node_mut(*idx)
                && !node.manual_position
            {
                node.position = *seed;
            }
        }
        let layout = run_pass(
            &self.graph,
            &self.config,
            &mut self.allocator,
            &mut self.router,
        );
        for node in layout.nodes.iter().filter(|node| !node.manual) {
            self.graph.set_position(node.idx, (node.x, node.y));
        }
        debug!(
            nodes = layout.nodes.len(),
            edges = layout.edges.len(),
            "engine pass written back"
        );
        layout
    }

    /// Removes an edge and frees the slots it held.
    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, GraphError> {
        if let Some(idx) = self.graph.edge_index(id) {
            self.allocator.release(idx);
        }
        self.graph.remove_edge(id)
    }

    /// Removes a node with its incident edges, freeing their slots.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>), GraphError> {
        if let Some(idx) = self.graph.node_index(id)
            && let Some(node) = self.graph.node(idx)
        {
            for edge in node.incoming.iter().chain(node.outgoing.iter()) {
                self.allocator.release(*edge);
            }
            self.seeds.remove(&idx);
        }
        self.graph.remove_node(id)
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{NodeIdx, ShapeClass};
    use crate::layout::EdgeSide;

    fn diamond_hub() -> Graph {
        let mut graph = Graph::new();
        graph.add_node("hub", ShapeClass::Diamond, 80.0, 80.0).unwrap();
        graph.add_node("a", ShapeClass::Rectangle, 100.0, 40.0).unwrap();
        graph.add_node("b", ShapeClass::Rectangle, 100.0, 40.0).unwrap();
        graph.add_edge("to-a", "hub", "a", None).unwrap();
        graph.add_edge("to-b", "hub", "b", None).unwrap();
        graph
    }

    #[test]
    fn run_writes_positions_back() {
        let mut engine = Engine::new(diamond_hub(), LayoutConfig::default());
        let layout = engine.run();
        for node in &layout.nodes {
            let stored = engine.graph().node(node.idx).and_then(|n| n.position);
            assert_eq!(stored, Some((node.x, node.y)));
        }
    }

    #[test]
    fn diamond_edges_never_share_a_vertex() {
        let mut engine = Engine::new(diamond_hub(), LayoutConfig::default());
        let layout = engine.run();
        let sides: Vec<EdgeSide> = layout.edges.iter().map(|edge| edge.source_side).collect();
        assert_eq!(sides.len(), 2);
        assert_ne!(sides[0], sides[1]);
    }

    #[test]
    fn removing_an_edge_releases_its_slot() {
        let mut engine = Engine::new(diamond_hub(), LayoutConfig::default());
        engine.run();
        let edge = engine.graph().edge_index("to-a").unwrap();
        assert!(engine.allocator().assignment(edge).is_some());
        engine.remove_edge("to-a").unwrap();
        assert!(engine.allocator().assignment(edge).is_none());
        let hub = NodeIdx(0);
        let held: usize = EdgeSide::ALL
            .iter()
            .map(|side| engine.allocator().occupants(hub, *side).len())
            .sum();
        assert_eq!(held, 1);
    }

    #[test]
    fn removing_a_node_releases_incident_slots() {
        let mut engine = Engine::new(diamond_hub(), LayoutConfig::default());
        engine.run();
        let (_, removed) = engine.remove_node("hub").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(engine.allocator().is_empty());
        assert!(engine.remove_node("hub").is_err());
    }

    #[test]
    fn repeated_force_runs_agree() {
        let config = LayoutConfig {
            algorithm: crate::config::LayoutAlgorithm::Force,
            ..LayoutConfig::default()
        };
        let fresh = crate::layout::compute_layout(&diamond_hub(), &config);
        let mut engine = Engine::new(diamond_hub(), config);
        let first = engine.run();
        let second = engine.run();
        for ((a, b), c) in first.nodes.iter().zip(&second.nodes).zip(&fresh.nodes) {
            assert_eq!((a.x, a.y), (b.x, b.y), "{} moved between runs", a.id);
            assert_eq!((a.x, a.y), (c.x, c.y));
        }
        for (a, b) in first.edges.iter().zip(&second.edges) {
            assert_eq!(a.points, b.points);
        }
    }

    #[test]
    fn manual_nodes_survive_repeated_runs() {
        let mut graph = diamond_hub();
        let a = graph.node_index("a").unwrap();
        graph.set_position(a, (400.0, -50.0));
        graph.set_manual(a, true);
        let mut engine = Engine::new(graph, LayoutConfig::default());
        engine.run();
        engine.run();
        assert_eq!(engine.graph().node(a).and_then(|n| n.position), Some((400.0, -50.0)));
    }
}

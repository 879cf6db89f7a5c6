use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TD", alias = "TB")]
    TopDown,
    #[serde(rename = "LR")]
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight)
    }
}

/// Closed set of node shape families. Everything shape-specific (slot sets,
/// attachment geometry) dispatches on this enum, see `layout::slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeClass {
    #[default]
    #[serde(alias = "rect", alias = "task", alias = "process")]
    Rectangle,
    #[serde(alias = "decision", alias = "gateway")]
    Diamond,
    #[serde(alias = "circle", alias = "event")]
    Ellipse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeIdx(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub shape: ShapeClass,
    pub width: f32,
    pub height: f32,
    /// Center position. `None` until a layout engine (or the caller) sets it.
    pub position: Option<Point>,
    pub manual_position: bool,
    pub incoming: Vec<EdgeIdx>,
    pub outgoing: Vec<EdgeIdx>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub source: NodeIdx,
    pub target: NodeIdx,
    pub label: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("duplicate edge id: {0}")]
    DuplicateEdge(String),
    #[error("edge {edge_id} references missing node {node_id}")]
    MissingNode { edge_id: String, node_id: String },
    #[error("edge {edge_id} is a self-loop on node {node_id}")]
    SelfLoop { edge_id: String, node_id: String },
    #[error("node {node_id} has a non-positive or non-finite size")]
    InvalidSize { node_id: String },
    #[error("unknown node id: {0}")]
    UnknownNode(String),
    #[error("unknown edge id: {0}")]
    UnknownEdge(String),
}

/// Produces ids for edges that arrive without one. Owned by whoever builds
/// the graph so two graphs never share a counter.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new("edge-")
    }
}

fn default_width() -> f32 {
    160.0
}

fn default_height() -> f32 {
    60.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    #[serde(default, alias = "shape")]
    pub shape_class: ShapeClass,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub manual_position: bool,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, shape_class: ShapeClass) -> Self {
        Self {
            id: id.into(),
            shape_class,
            width: default_width(),
            height: default_height(),
            position: None,
            manual_position: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "source")]
    pub source_id: String,
    #[serde(alias = "target")]
    pub target_id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Input records as handed over by the data-loading side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// Node/edge arena. Indices stay stable across removals; removed slots are
/// tombstoned so `NodeIdx`/`EdgeIdx` handed out earlier never alias.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    node_lookup: HashMap<String, NodeIdx>,
    edge_lookup: HashMap<String, EdgeIdx>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spec(spec: &GraphSpec, ids: &mut IdGenerator) -> Result<Self, GraphError> {
        let mut graph = Graph::new();
        for node in &spec.nodes {
            let idx = graph.add_node(&node.id, node.shape_class, node.width, node.height)?;
            if let Some(pos) = node.position {
                graph.set_position(idx, pos);
            }
            if node.manual_position {
                graph.set_manual(idx, true);
            }
        }
        for edge in &spec.edges {
            let id = match &edge.id {
                Some(id) => id.clone(),
                None => ids.next_id(),
            };
            graph.add_edge(&id, &edge.source_id, &edge.target_id, edge.label.clone())?;
        }
        Ok(graph)
    }

    pub fn add_node(
        &mut self,
        id: &str,
        shape: ShapeClass,
        width: f32,
        height: f32,
    ) -> Result<NodeIdx, GraphError> {
        if self.node_lookup.contains_key(id) {
            return Err(GraphError::DuplicateNode(id.to_string()));
        }
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(GraphError::InvalidSize {
                node_id: id.to_string(),
            });
        }
        let idx = NodeIdx(self.nodes.len());
        self.nodes.push(Some(Node {
            id: id.to_string(),
            shape,
            width,
            height,
            position: None,
            manual_position: false,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.node_lookup.insert(id.to_string(), idx);
        Ok(idx)
    }

    pub fn add_edge(
        &mut self,
        id: &str,
        source_id: &str,
        target_id: &str,
        label: Option<String>,
    ) -> Result<EdgeIdx, GraphError> {
        if self.edge_lookup.contains_key(id) {
            return Err(GraphError::DuplicateEdge(id.to_string()));
        }
        let source = self.resolve_endpoint(id, source_id)?;
        let target = self.resolve_endpoint(id, target_id)?;
        if source == target {
            return Err(GraphError::SelfLoop {
                edge_id: id.to_string(),
                node_id: source_id.to_string(),
            });
        }
        let idx = EdgeIdx(self.edges.len());
        self.edges.push(Some(Edge {
            id: id.to_string(),
            source,
            target,
            label,
        }));
        self.edge_lookup.insert(id.to_string(), idx);
        if let Some(node) = self.node_mut(source) {
            node.outgoing.push(idx);
        }
        if let Some(node) = self.node_mut(target) {
            node.incoming.push(idx);
        }
        Ok(idx)
    }

    fn resolve_endpoint(&self, edge_id: &str, node_id: &str) -> Result<NodeIdx, GraphError> {
        self.node_lookup
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::MissingNode {
                edge_id: edge_id.to_string(),
                node_id: node_id.to_string(),
            })
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, GraphError> {
        let idx = self
            .edge_lookup
            .remove(id)
            .ok_or_else(|| GraphError::UnknownEdge(id.to_string()))?;
        let edge = self
            .edges
            .get_mut(idx.0)
            .and_then(Option::take)
            .ok_or_else(|| GraphError::UnknownEdge(id.to_string()))?;
        if let Some(node) = self.node_mut(edge.source) {
            node.outgoing.retain(|e| *e != idx);
        }
        if let Some(node) = self.node_mut(edge.target) {
            node.incoming.retain(|e| *e != idx);
        }
        Ok(edge)
    }

    /// Removes a node and every edge touching it. Returns the removed edges so
    /// callers holding per-edge state can drop it.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>), GraphError> {
        let idx = self
            .node_lookup
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let mut incident: Vec<String> = Vec::new();
        if let Some(node) = self.node(idx) {
            for edge_idx in node.incoming.iter().chain(node.outgoing.iter()) {
                if let Some(edge) = self.edge(*edge_idx) {
                    incident.push(edge.id.clone());
                }
            }
        }
        let mut removed = Vec::with_capacity(incident.len());
        for edge_id in incident {
            removed.push(self.remove_edge(&edge_id)?);
        }
        self.node_lookup.remove(id);
        let node = self
            .nodes
            .get_mut(idx.0)
            .and_then(Option::take)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        Ok((node, removed))
    }

    pub fn node(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get(idx.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> Option<&mut Node> {
        self.nodes.get_mut(idx.0).and_then(Option::as_mut)
    }

    pub fn edge(&self, idx: EdgeIdx) -> Option<&Edge> {
        self.edges.get(idx.0).and_then(Option::as_ref)
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIdx> {
        self.node_lookup.get(id).copied()
    }

    pub fn edge_index(&self, id: &str) -> Option<EdgeIdx> {
        self.edge_lookup.get(id).copied()
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.node_index(id).and_then(|idx| self.node(idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|node| (NodeIdx(i), node)))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeIdx, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| edge.as_ref().map(|edge| (EdgeIdx(i), edge)))
    }

    pub fn node_count(&self) -> usize {
        self.node_lookup.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_lookup.len()
    }

    pub fn set_position(&mut self, idx: NodeIdx, position: Point) {
        if let Some(node) = self.node_mut(idx) {
            node.position = Some(position);
        }
    }

    pub fn set_manual(&mut self, idx: NodeIdx, manual: bool) {
        if let Some(node) = self.node_mut(idx) {
            node.manual_position = manual;
        }
    }
}

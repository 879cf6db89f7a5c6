use serde::Serialize;

use crate::geometry::{Point, Rect};
use crate::ir::{EdgeIdx, NodeIdx, ShapeClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Top,
    Right,
    Bottom,
    Left,
}

impl EdgeSide {
    pub const ALL: [EdgeSide; 4] = [EdgeSide::Top, EdgeSide::Right, EdgeSide::Bottom, EdgeSide::Left];

    /// Unit vector pointing away from the node.
    pub fn outward(self) -> Point {
        match self {
            EdgeSide::Top => (0.0, -1.0),
            EdgeSide::Right => (1.0, 0.0),
            EdgeSide::Bottom => (0.0, 1.0),
            EdgeSide::Left => (-1.0, 0.0),
        }
    }

    pub fn opposite(self) -> EdgeSide {
        match self {
            EdgeSide::Top => EdgeSide::Bottom,
            EdgeSide::Right => EdgeSide::Left,
            EdgeSide::Bottom => EdgeSide::Top,
            EdgeSide::Left => EdgeSide::Right,
        }
    }

    /// Left/Right sides: connectors leave horizontally and fan out along y.
    pub fn is_vertical(self) -> bool {
        matches!(self, EdgeSide::Left | EdgeSide::Right)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LayoutWarning {
    NoRootFallback { node_id: String },
    CoincidentNodes { a: String, b: String },
    CoincidentEndpoints { edge_id: String },
    SlotsExhausted { node_id: String, edge_id: String },
    MissingPosition { node_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLayout {
    #[serde(skip)]
    pub idx: NodeIdx,
    pub id: String,
    pub shape: ShapeClass,
    /// Center.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub manual: bool,
    pub rank: Option<usize>,
}

impl NodeLayout {
    pub fn bounds(&self) -> Rect {
        Rect::from_center((self.x, self.y), self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub position: Point,
    /// Unit normal the label was pushed along.
    pub direction: Point,
    pub segment_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeLayout {
    #[serde(skip)]
    pub idx: EdgeIdx,
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub points: Vec<Point>,
    /// Direction of the final segment, radians.
    pub arrow_angle: f32,
    pub label_anchor: Option<LabelPlacement>,
    pub source_side: EdgeSide,
    pub target_side: EdgeSide,
    pub source_offset: f32,
    pub target_offset: f32,
    pub is_loop: bool,
    pub bends: usize,
    pub length: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<EdgeLayout>,
    pub bounds: Rect,
    pub warnings: Vec<LayoutWarning>,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeLayout> {
        self.edges.iter().find(|edge| edge.id == id)
    }
}

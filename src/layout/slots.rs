//! Connection slots: where connectors may attach to a node and which of
//! those attachment points are taken.
//!
//! Shape-specific rules live on [`ShapeClass`] so the router, the allocator
//! and an external renderer drawing handles all read the same geometry.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::geometry::{EPS, Point, Rect, ray_ellipse_intersection};
use crate::ir::{Direction, EdgeIdx, NodeIdx, ShapeClass};

use super::ports::{SideOccupant, assign_offsets};
use super::{EdgeSide, LayoutWarning, NodeLayout};

impl ShapeClass {
    /// Diamond-like nodes only accept one connector per vertex.
    pub fn has_discrete_slots(self) -> bool {
        matches!(self, ShapeClass::Diamond)
    }

    pub fn slot_sides(self) -> [EdgeSide; 4] {
        EdgeSide::ALL
    }

    /// Attachment point on `side`, shifted `offset` pixels along the side.
    /// The offset is clamped to half the side length minus one pixel and is
    /// ignored for shapes with discrete slots.
    pub fn connection_point(self, bounds: &Rect, side: EdgeSide, offset: f32) -> Point {
        let center = bounds.center();
        let (half_along, half_across) = if side.is_vertical() {
            (bounds.height / 2.0, bounds.width / 2.0)
        } else {
            (bounds.width / 2.0, bounds.height / 2.0)
        };
        let limit = half_along - 1.0;
        let offset = if self.has_discrete_slots() || limit <= 0.0 {
            0.0
        } else {
            offset.clamp(-limit, limit)
        };
        let dir = side.outward();
        let perp = if side.is_vertical() { (0.0, 1.0) } else { (1.0, 0.0) };
        let origin = (center.0 + perp.0 * offset, center.1 + perp.1 * offset);
        let side_point = (origin.0 + dir.0 * half_across, origin.1 + dir.1 * half_across);

        match self {
            ShapeClass::Rectangle | ShapeClass::Diamond => side_point,
            ShapeClass::Ellipse => ray_ellipse_intersection(
                origin,
                dir,
                center,
                bounds.width / 2.0,
                bounds.height / 2.0,
            )
            .unwrap_or(side_point),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotGeometry {
    pub side: EdgeSide,
    pub point: Point,
    /// Whether several connectors may share the side at different offsets.
    pub fans_out: bool,
}

/// Base attachment points for a shape placed at `bounds`.
pub fn slot_geometry(shape: ShapeClass, bounds: &Rect) -> Vec<SlotGeometry> {
    shape
        .slot_sides()
        .into_iter()
        .map(|side| SlotGeometry {
            side,
            point: shape.connection_point(bounds, side, 0.0),
            fans_out: !shape.has_discrete_slots(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSlot {
    pub node_id: String,
    pub side: EdgeSide,
    /// Normalized to -1..1 of the side's half length.
    pub offset_along_side: f32,
    pub occupied_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub node: NodeIdx,
    pub side: EdgeSide,
}

pub struct SlotRequest<'a> {
    pub edge: EdgeIdx,
    pub edge_id: &'a str,
    pub source: &'a NodeLayout,
    pub target: &'a NodeLayout,
    pub direction: Direction,
    pub is_loop: bool,
}

/// Side both ends of a loop use: outside the main flow corridor.
pub fn loop_side(direction: Direction) -> EdgeSide {
    if direction.is_horizontal() {
        EdgeSide::Bottom
    } else {
        EdgeSide::Right
    }
}

/// Side pair facing each other along the dominant axis of `to - from`.
/// Equal magnitudes (including coincident centers) follow the flow direction.
pub fn preferred_sides(from: Point, to: Point, direction: Direction) -> (EdgeSide, EdgeSide) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let horizontal = if (dx.abs() - dy.abs()).abs() <= EPS {
        direction.is_horizontal()
    } else {
        dx.abs() > dy.abs()
    };
    if horizontal {
        if dx < -EPS {
            (EdgeSide::Left, EdgeSide::Right)
        } else {
            (EdgeSide::Right, EdgeSide::Left)
        }
    } else if dy < -EPS {
        (EdgeSide::Top, EdgeSide::Bottom)
    } else {
        (EdgeSide::Bottom, EdgeSide::Top)
    }
}

/// Occupancy table for one routing pass. Must be cleared before a full
/// re-route and released per edge on removal.
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    occupancy: BTreeMap<(NodeIdx, EdgeSide), Vec<SideOccupant>>,
    assignments: HashMap<EdgeIdx, (SlotRef, SlotRef)>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.occupancy.clear();
        self.assignments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignment(&self, edge: EdgeIdx) -> Option<(SlotRef, SlotRef)> {
        self.assignments.get(&edge).copied()
    }

    pub fn occupants(&self, node: NodeIdx, side: EdgeSide) -> &[SideOccupant] {
        self.occupancy
            .get(&(node, side))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn is_occupied(&self, node: NodeIdx, side: EdgeSide) -> bool {
        !self.occupants(node, side).is_empty()
    }

    /// Chooses and marks a side on each endpoint. Re-allocating an edge first
    /// releases whatever it held.
    pub fn allocate(
        &mut self,
        request: &SlotRequest<'_>,
        warnings: &mut Vec<LayoutWarning>,
    ) -> (SlotRef, SlotRef) {
        self.release(request.edge);
        let source_center = (request.source.x, request.source.y);
        let target_center = (request.target.x, request.target.y);
        let (source_pref, target_pref) = if request.is_loop {
            let side = loop_side(request.direction);
            (side, side)
        } else {
            preferred_sides(source_center, target_center, request.direction)
        };

        let source_side = self.pick_side(
            request.source,
            source_pref,
            target_center,
            request.edge_id,
            warnings,
        );
        let target_side = self.pick_side(
            request.target,
            target_pref,
            source_center,
            request.edge_id,
            warnings,
        );

        let source = SlotRef {
            node: request.source.idx,
            side: source_side,
        };
        let target = SlotRef {
            node: request.target.idx,
            side: target_side,
        };
        self.occupy(source, request.edge, request.edge_id, target_center);
        self.occupy(target, request.edge, request.edge_id, source_center);
        self.assignments.insert(request.edge, (source, target));
        (source, target)
    }

    fn pick_side(
        &self,
        node: &NodeLayout,
        preferred: EdgeSide,
        toward: Point,
        edge_id: &str,
        warnings: &mut Vec<LayoutWarning>,
    ) -> EdgeSide {
        if !node.shape.has_discrete_slots() || !self.is_occupied(node.idx, preferred) {
            return preferred;
        }
        let delta = (toward.0 - node.x, toward.1 - node.y);
        let facing = |side: EdgeSide| {
            let out = side.outward();
            out.0 * delta.0 + out.1 * delta.1
        };
        let mut fallbacks: Vec<EdgeSide> = node
            .shape
            .slot_sides()
            .into_iter()
            .filter(|side| *side != preferred)
            .collect();
        // Adjacent vertices before the opposite one, then by how much they face the other end.
        fallbacks.sort_by(|a, b| {
            let a_opposite = *a == preferred.opposite();
            let b_opposite = *b == preferred.opposite();
            a_opposite
                .cmp(&b_opposite)
                .then_with(|| facing(*b).total_cmp(&facing(*a)))
        });
        if let Some(side) = fallbacks
            .into_iter()
            .find(|side| !self.is_occupied(node.idx, *side))
        {
            return side;
        }
        warn!(node = %node.id, edge = %edge_id, "all connection slots occupied; reusing preferred slot");
        warnings.push(LayoutWarning::SlotsExhausted {
            node_id: node.id.clone(),
            edge_id: edge_id.to_string(),
        });
        preferred
    }

    fn occupy(&mut self, slot: SlotRef, edge: EdgeIdx, edge_id: &str, other: Point) {
        self.occupancy
            .entry((slot.node, slot.side))
            .or_default()
            .push(SideOccupant {
                edge,
                edge_id: edge_id.to_string(),
                other,
            });
    }

    pub fn release(&mut self, edge: EdgeIdx) {
        let Some((source, target)) = self.assignments.remove(&edge) else {
            return;
        };
        for slot in [source, target] {
            let key = (slot.node, slot.side);
            if let Some(list) = self.occupancy.get_mut(&key) {
                list.retain(|occ| occ.edge != edge);
                if list.is_empty() {
                    self.occupancy.remove(&key);
                }
            }
        }
    }

    /// Pixel offsets along `side` for every connector sharing it. Discrete
    /// slots never fan out.
    pub fn fan_out(&self, node: &NodeLayout, side: EdgeSide) -> Vec<(EdgeIdx, f32)> {
        let occupants = self.occupants(node.idx, side);
        if node.shape.has_discrete_slots() {
            return occupants.iter().map(|occ| (occ.edge, 0.0)).collect();
        }
        assign_offsets(side, occupants)
    }

    /// Every slot of `node` with its current occupant. Fan-out sides report
    /// one slot per connector; free sides report their midpoint.
    pub fn get_slots(&self, node: &NodeLayout) -> Vec<ConnectionSlot> {
        let mut slots = Vec::new();
        for side in node.shape.slot_sides() {
            let occupants = self.occupants(node.idx, side);
            if occupants.is_empty() {
                slots.push(ConnectionSlot {
                    node_id: node.id.clone(),
                    side,
                    offset_along_side: 0.0,
                    occupied_by: None,
                });
                continue;
            }
            if node.shape.has_discrete_slots() {
                slots.push(ConnectionSlot {
                    node_id: node.id.clone(),
                    side,
                    offset_along_side: 0.0,
                    occupied_by: occupants.first().map(|occ| occ.edge_id.clone()),
                });
                continue;
            }
            let half = if side.is_vertical() {
                node.height / 2.0
            } else {
                node.width / 2.0
            };
            let ids: HashMap<EdgeIdx, &str> = occupants
                .iter()
                .map(|occ| (occ.edge, occ.edge_id.as_str()))
                .collect();
            for (edge, offset) in assign_offsets(side, occupants) {
                let normalized = if half > 0.0 {
                    (offset / half).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
                slots.push(ConnectionSlot {
                    node_id: node.id.clone(),
                    side,
                    offset_along_side: normalized,
                    occupied_by: ids.get(&edge).map(|id| id.to_string()),
                });
            }
        }
        slots
    }
}

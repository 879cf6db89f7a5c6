//! Spring/repulsion simulation used when no hierarchical order is wanted.

use std::collections::HashSet;
use std::f32::consts::TAU;

use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::geometry::Point;
use crate::ir::{Graph, NodeIdx};

use super::{LayoutWarning, Placement};

/// Below this separation two nodes count as coincident.
const COINCIDENT_DIST: f32 = 1e-3;
/// Golden-ratio fraction used to spread coincident pairs deterministically.
const GOLDEN_FRACTION: f32 = 0.618_034;

struct Body {
    idx: NodeIdx,
    pos: Point,
    vel: Point,
    fixed: bool,
}

pub(super) fn layout(graph: &Graph, config: &LayoutConfig) -> Placement {
    let mut placement = Placement::default();
    let force = &config.force;

    let mut bodies: Vec<Body> = Vec::with_capacity(graph.node_count());
    let unseeded: Vec<NodeIdx> = graph
        .nodes()
        .filter(|(_, node)| node.position.is_none() && !node.manual_position)
        .map(|(idx, _)| idx)
        .collect();
    for (idx, node) in graph.nodes() {
        let pos = match node.position {
            Some(pos) => pos,
            None => match unseeded.iter().position(|candidate| *candidate == idx) {
                Some(slot) => seed_on_circle(slot, unseeded.len(), force.seed_radius),
                None => (0.0, 0.0),
            },
        };
        bodies.push(Body {
            idx,
            pos,
            vel: (0.0, 0.0),
            fixed: node.manual_position,
        });
    }
    if bodies.is_empty() {
        return placement;
    }

    let index_of = |idx: NodeIdx| bodies.iter().position(|body| body.idx == idx);
    let springs: Vec<(usize, usize)> = graph
        .edges()
        .filter_map(|(_, edge)| Some((index_of(edge.source)?, index_of(edge.target)?)))
        .collect();

    let mut coincident: HashSet<(usize, usize)> = HashSet::new();
    let mut forces: Vec<Point> = vec![(0.0, 0.0); bodies.len()];
    for _ in 0..force.iterations {
        forces.iter_mut().for_each(|f| *f = (0.0, 0.0));

        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let dx = bodies[i].pos.0 - bodies[j].pos.0;
                let dy = bodies[i].pos.1 - bodies[j].pos.1;
                let mut dist = (dx * dx + dy * dy).sqrt();
                let dir = if dist < COINCIDENT_DIST {
                    if coincident.insert((i, j)) {
                        report_coincident(graph, &bodies[i], &bodies[j], &mut placement);
                    }
                    dist = 1.0;
                    let angle = ((i as f32 + 1.0) * GOLDEN_FRACTION + j as f32 * 0.5).fract() * TAU;
                    (angle.cos(), angle.sin())
                } else {
                    (dx / dist, dy / dist)
                };
                let magnitude = force.node_repulsion / (dist * dist);
                forces[i].0 += dir.0 * magnitude;
                forces[i].1 += dir.1 * magnitude;
                forces[j].0 -= dir.0 * magnitude;
                forces[j].1 -= dir.1 * magnitude;
            }
        }

        for &(s, t) in &springs {
            let dx = bodies[t].pos.0 - bodies[s].pos.0;
            let dy = bodies[t].pos.1 - bodies[s].pos.1;
            forces[s].0 += dx * force.edge_attraction;
            forces[s].1 += dy * force.edge_attraction;
            forces[t].0 -= dx * force.edge_attraction;
            forces[t].1 -= dy * force.edge_attraction;
        }

        for (body, f) in bodies.iter_mut().zip(forces.iter()) {
            if body.fixed {
                continue;
            }
            let fx = f.0 - body.pos.0 * force.center_gravity;
            let fy = f.1 - body.pos.1 * force.center_gravity;
            let mut vx = (body.vel.0 + fx) * force.damping;
            let mut vy = (body.vel.1 + fy) * force.damping;
            let speed = (vx * vx + vy * vy).sqrt();
            if force.max_step > 0.0 && speed > force.max_step {
                vx *= force.max_step / speed;
                vy *= force.max_step / speed;
            }
            body.vel = (vx, vy);
            body.pos = (body.pos.0 + vx, body.pos.1 + vy);
        }
    }

    for body in &bodies {
        if !body.fixed {
            placement.positions.insert(body.idx, body.pos);
        }
    }
    debug!(
        nodes = bodies.len(),
        iterations = force.iterations,
        "force layout complete"
    );
    placement
}

fn seed_on_circle(slot: usize, count: usize, radius: f32) -> Point {
    let angle = TAU * slot as f32 / count.max(1) as f32;
    (radius * angle.cos(), radius * angle.sin())
}

fn report_coincident(graph: &Graph, a: &Body, b: &Body, placement: &mut Placement) {
    let name = |idx: NodeIdx| graph.node(idx).map(|n| n.id.clone()).unwrap_or_default();
    let (a, b) = (name(a.idx), name(b.idx));
    warn!(a = %a, b = %b, "coincident nodes in force layout; treating distance as 1");
    placement
        .warnings
        .push(LayoutWarning::CoincidentNodes { a, b });
}

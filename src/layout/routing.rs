//! Orthogonal connector routing.
//!
//! Every route starts as a candidate picked by the relationship of the two
//! attachment sides (opposite, perpendicular, same) or as a loop lane for
//! back-edges, whatever sides they were given. The candidate is normalized,
//! nudged away from paths already placed in this pass, and normalized again.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{trace, warn};

use crate::config::{DEFAULT_LOOP_KEYWORDS, RoutingConfig};
use crate::geometry::{
    EPS, Point, Rect, Segment, are_collinear, collinear_overlap_length, interval_overlap,
    is_horizontal, is_orthogonal_step, is_vertical, path_bend_count, path_length, points_equal,
    segment_intersects_rect, segments_intersect, snap_to_grid, snap_value,
};
use crate::ir::Direction;

use super::channels::{ChannelGrid, LaneLine, LegCosts};
use super::{EdgeSide, LayoutWarning};

/// A turn on a loop leg costs as much as this much extra length; crossing a
/// forward connector costs far more.
const LOOP_LEG_COSTS: LegCosts = LegCosts {
    turn: 20.0,
    crossing: 400.0,
};
/// Lane refits when the legs widen the loop's span.
const LANE_REFITS: usize = 3;

static DEFAULT_LOOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_LOOP_KEYWORDS).unwrap());

/// Decides whether an edge runs against the flow.
#[derive(Debug, Clone)]
pub struct LoopDetector {
    keywords: Regex,
    direction: Direction,
}

impl LoopDetector {
    pub fn new(config: &RoutingConfig, direction: Direction) -> Self {
        let keywords = if config.loop_keywords == DEFAULT_LOOP_KEYWORDS {
            DEFAULT_LOOP_RE.clone()
        } else {
            match Regex::new(&config.loop_keywords) {
                Ok(re) => re,
                Err(err) => {
                    warn!(%err, "invalid loop keyword pattern; using the built-in one");
                    DEFAULT_LOOP_RE.clone()
                }
            }
        };
        Self {
            keywords,
            direction,
        }
    }

    pub fn label_marks_loop(&self, label: Option<&str>) -> bool {
        label.is_some_and(|text| self.keywords.is_match(text))
    }

    /// Target lies entirely before the source along the primary axis.
    pub fn is_behind(&self, source: &Rect, target: &Rect) -> bool {
        if self.direction.is_horizontal() {
            target.right() < source.left()
        } else {
            target.bottom() < source.top()
        }
    }

    pub fn is_loop(&self, label: Option<&str>, source: &Rect, target: &Rect) -> bool {
        self.label_marks_loop(label) || self.is_behind(source, target)
    }
}

#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub edge_id: &'a str,
    /// Attachment points, fan-out offsets already applied.
    pub source: Point,
    pub target: Point,
    pub source_side: EdgeSide,
    pub target_side: EdgeSide,
    pub source_bounds: Rect,
    pub target_bounds: Rect,
    pub is_loop: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub points: Vec<Point>,
    /// Direction of the final segment, radians.
    pub arrival_angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Coincident,
    Loop,
    Straight,
    Z,
    U,
    L,
    SameSide,
}

#[derive(Debug, Clone)]
struct PlacedPath {
    points: Vec<Point>,
    is_loop: bool,
}

/// Router with the per-pass cache of already placed paths. Call
/// [`OrthogonalRouter::clear`] before each full routing pass.
#[derive(Debug, Clone, Default)]
pub struct OrthogonalRouter {
    config: RoutingConfig,
    placed: Vec<PlacedPath>,
}

impl OrthogonalRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            placed: Vec::new(),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RoutingConfig) {
        self.config = config;
        self.placed.clear();
    }

    pub fn clear(&mut self) {
        self.placed.clear();
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    /// Routes one edge against the paths placed so far and records the
    /// result. `obstacles` are node rectangles the loop lane must clear.
    pub fn route(
        &mut self,
        request: &RouteRequest<'_>,
        obstacles: &[Rect],
        warnings: &mut Vec<LayoutWarning>,
    ) -> Route {
        let (strategy, raw) = self.initial_path(request, obstacles, warnings);
        let mut points = normalize_path(&raw, self.config.grid_size);
        if strategy != Strategy::Coincident {
            points = self.avoid_collisions(&points);
        }
        trace!(
            edge = %request.edge_id,
            ?strategy,
            bends = path_bend_count(&points),
            "routed edge"
        );
        self.placed.push(PlacedPath {
            points: points.clone(),
            is_loop: request.is_loop,
        });
        Route {
            arrival_angle: arrival_angle(&points),
            points,
        }
    }

    fn initial_path(
        &self,
        req: &RouteRequest<'_>,
        obstacles: &[Rect],
        warnings: &mut Vec<LayoutWarning>,
    ) -> (Strategy, Vec<Point>) {
        let (s, t) = (req.source, req.target);
        if points_equal(s, t) {
            warn!(edge = %req.edge_id, "coincident route endpoints; emitting a minimum-length stub");
            warnings.push(LayoutWarning::CoincidentEndpoints {
                edge_id: req.edge_id.to_string(),
            });
            return (
                Strategy::Coincident,
                vec![s, stub(s, req.source_side, self.config.min_clearance)],
            );
        }
        if req.is_loop {
            return (Strategy::Loop, self.loop_path(req, obstacles));
        }
        if req.source_side == req.target_side {
            let side = req.source_side;
            let sign = outward_sign(side);
            let extreme = (sign * side_extent(&req.source_bounds, side))
                .max(sign * side_extent(&req.target_bounds, side));
            let lane = sign * (extreme + self.config.same_side_clearance);
            return (Strategy::SameSide, self.same_side_path(req, lane));
        }
        if req.target_side == req.source_side.opposite() {
            return self.opposite_path(req);
        }
        (Strategy::L, self.perpendicular_path(req, obstacles))
    }

    /// Out along the shared side to `lane`, across, and back in.
    fn same_side_path(&self, req: &RouteRequest<'_>, lane: f32) -> Vec<Point> {
        let side = req.source_side;
        let s1 = stub(req.source, side, self.config.min_clearance);
        let t1 = stub(req.target, req.target_side, self.config.min_clearance);
        vec![
            req.source,
            s1,
            from_axes(lane, cross_coord(s1, side), side),
            from_axes(lane, cross_coord(t1, side), side),
            t1,
            req.target,
        ]
    }

    /// Back-edge around the flow. Each end leaves through its stub and
    /// follows free channels out to a lane on the source's side; the lane
    /// then joins the two legs. The target may sit on any side.
    fn loop_path(&self, req: &RouteRequest<'_>, obstacles: &[Rect]) -> Vec<Point> {
        let side = req.source_side;
        let c = self.config.min_clearance;
        let s1 = stub(req.source, side, c);
        let t1 = stub(req.target, req.target_side, c);
        let blockers: Vec<Rect> = [req.source_bounds, req.target_bounds]
            .into_iter()
            .chain(obstacles.iter().copied())
            .map(inset)
            .collect();
        let forward: Vec<Segment> = self
            .placed
            .iter()
            .filter(|path| !path.is_loop)
            .flat_map(|path| path.points.windows(2).map(|seg| (seg[0], seg[1])))
            .collect();

        let mut span = (
            cross_coord(s1, side).min(cross_coord(t1, side)),
            cross_coord(s1, side).max(cross_coord(t1, side)),
        );
        let mut legs = (vec![s1], vec![t1]);
        for _ in 0..LANE_REFITS {
            let lane = self.loop_lane(req, obstacles, span, &[s1, t1]);
            let line = LaneLine {
                vertical: side.is_vertical(),
                at: lane,
                sign: outward_sign(side),
            };
            let grid = ChannelGrid::new(&blockers, &forward, &[s1, t1], line, c);
            let leg = |from: Point| {
                grid.as_ref()
                    .and_then(|grid| grid.leg_to_lane(from, LOOP_LEG_COSTS))
                    .unwrap_or_else(|| vec![from, from_axes(lane, cross_coord(from, side), side)])
            };
            legs = (leg(s1), leg(t1));

            let reach = |leg: &[Point]| leg.last().map_or(span.0, |p| cross_coord(*p, side));
            let (a, b) = (reach(&legs.0), reach(&legs.1));
            let widened = (span.0.min(a).min(b), span.1.max(a).max(b));
            if widened.0 >= span.0 - EPS && widened.1 <= span.1 + EPS {
                break;
            }
            span = widened;
        }

        let (out, mut back) = legs;
        back.reverse();
        let mut points = Vec::with_capacity(out.len() + back.len() + 2);
        points.push(req.source);
        points.extend(out);
        points.extend(back);
        points.push(req.target);
        points
    }

    /// Lane coordinate `loop_offset` past everything across `span`: both
    /// endpoint nodes, the stubs, overlapping obstacles and forward paths.
    fn loop_lane(
        &self,
        req: &RouteRequest<'_>,
        obstacles: &[Rect],
        (lo, hi): (f32, f32),
        stubs: &[Point],
    ) -> f32 {
        let side = req.source_side;
        let sign = outward_sign(side);
        let pad = self.config.edge_spacing;

        let mut extreme = (sign * side_extent(&req.source_bounds, side))
            .max(sign * side_extent(&req.target_bounds, side));
        for point in stubs {
            extreme = extreme.max(sign * main_coord(*point, side));
        }
        for rect in obstacles {
            let (a, b) = cross_span(rect, side);
            if interval_overlap(a - pad, b + pad, lo, hi) > 0.0 {
                extreme = extreme.max(sign * side_extent(rect, side));
            }
        }
        for path in self.placed.iter().filter(|path| !path.is_loop) {
            for seg in path.points.windows(2) {
                let (a, b) = (seg[0], seg[1]);
                if interval_overlap(cross_coord(a, side), cross_coord(b, side), lo, hi) >= -EPS {
                    extreme = extreme
                        .max(sign * main_coord(a, side))
                        .max(sign * main_coord(b, side));
                }
            }
        }
        sign * (extreme + self.config.loop_offset)
    }

    fn opposite_path(&self, req: &RouteRequest<'_>) -> (Strategy, Vec<Point>) {
        let side = req.source_side;
        let (s, t) = (req.source, req.target);
        let forward = outward_sign(side) * (main_coord(t, side) - main_coord(s, side));
        let cross_gap = cross_coord(t, side) - cross_coord(s, side);

        if forward > EPS && cross_gap.abs() <= self.config.align_tolerance {
            return (
                Strategy::Straight,
                vec![s, from_axes(main_coord(t, side), cross_coord(s, side), side)],
            );
        }
        if forward > EPS {
            let mid = (main_coord(s, side) + main_coord(t, side)) / 2.0;
            return (
                Strategy::Z,
                vec![
                    s,
                    from_axes(mid, cross_coord(s, side), side),
                    from_axes(mid, cross_coord(t, side), side),
                    t,
                ],
            );
        }

        // Target is behind the exit: leave, swing around, come back in.
        let c = self.config.min_clearance;
        let s1 = stub(s, side, c);
        let t1 = stub(t, req.target_side, c);
        let lane = self.u_lane(req);
        (
            Strategy::U,
            vec![
                s,
                s1,
                from_axes(main_coord(s1, side), lane, side),
                from_axes(main_coord(t1, side), lane, side),
                t1,
                t,
            ],
        )
    }

    /// Cross coordinate for the return leg of a U: the gap between the two
    /// nodes when there is one, otherwise around the nearer outer edge.
    fn u_lane(&self, req: &RouteRequest<'_>) -> f32 {
        let side = req.source_side;
        let (a0, a1) = cross_span(&req.source_bounds, side);
        let (b0, b1) = cross_span(&req.target_bounds, side);
        if a1 < b0 {
            return (a1 + b0) / 2.0;
        }
        if b1 < a0 {
            return (b1 + a0) / 2.0;
        }
        let c = self.config.min_clearance;
        let low = a0.min(b0) - c;
        let high = a1.max(b1) + c;
        let sc = cross_coord(req.source, side);
        let tc = cross_coord(req.target, side);
        let cost = |lane: f32| (sc - lane).abs() + (tc - lane).abs();
        if cost(low) <= cost(high) { low } else { high }
    }

    /// Stubs out of both sides joined by a single corner; the corner that
    /// keeps the path out of the nodes with the fewest bends wins.
    fn perpendicular_path(&self, req: &RouteRequest<'_>, obstacles: &[Rect]) -> Vec<Point> {
        let c = self.config.min_clearance;
        let (s, t) = (req.source, req.target);
        let s1 = stub(s, req.source_side, c);
        let t1 = stub(t, req.target_side, c);
        let blockers: Vec<Rect> = [req.source_bounds, req.target_bounds]
            .into_iter()
            .chain(obstacles.iter().copied())
            .map(inset)
            .collect();

        let mut best: Option<(f32, Vec<Point>)> = None;
        for corner in [(t1.0, s1.1), (s1.0, t1.1)] {
            let candidate = normalize_path(&[s, s1, corner, t1, t], 0.0);
            let hits = candidate
                .windows(2)
                .map(|seg| {
                    blockers
                        .iter()
                        .filter(|rect| segment_intersects_rect(seg[0], seg[1], rect))
                        .count()
                })
                .sum::<usize>();
            let (crossings, overlap) = self.crossings_with_placed(&candidate);
            let score = hits as f32 * 10_000.0
                + path_bend_count(&candidate) as f32 * 100.0
                + crossings as f32 * 50.0
                + path_length(&candidate)
                + overlap;
            if best.as_ref().is_none_or(|(current, _)| score < *current) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, path)| path)
            .unwrap_or_else(|| vec![s, s1, t1, t])
    }

    /// Crossing count and collinear overlap length against placed paths.
    fn crossings_with_placed(&self, points: &[Point]) -> (usize, f32) {
        let existing: Vec<Segment> = self
            .placed
            .iter()
            .flat_map(|path| path.points.windows(2).map(|seg| (seg[0], seg[1])))
            .collect();
        if points.len() < 2 || existing.is_empty() {
            return (0, 0.0);
        }
        let mut crossings = 0usize;
        let mut overlap = 0.0f32;
        for seg in points.windows(2) {
            let (a1, a2) = (seg[0], seg[1]);
            for &(b1, b2) in &existing {
                if points_equal(a1, b1)
                    || points_equal(a1, b2)
                    || points_equal(a2, b1)
                    || points_equal(a2, b2)
                {
                    continue;
                }
                overlap += collinear_overlap_length(a1, a2, b1, b2);
                if segments_intersect(a1, a2, b1, b2) {
                    crossings += 1;
                }
            }
        }
        (crossings, overlap)
    }

    /// One pass over the interior segments: a segment running parallel to a
    /// placed one, closer than the spacing and overlapping it, is moved to
    /// exactly one spacing away. End segments stay attached to their ports.
    fn avoid_collisions(&self, points: &[Point]) -> Vec<Point> {
        if points.len() < 4 || self.placed.is_empty() {
            return points.to_vec();
        }
        let spacing = self.config.edge_spacing;
        let mut out = points.to_vec();
        for k in 1..out.len() - 2 {
            let (a, b) = (out[k], out[k + 1]);
            let horizontal = is_horizontal(a, b);
            if !horizontal && !is_vertical(a, b) {
                continue;
            }
            let mut coord = if horizontal { a.1 } else { a.0 };
            let (lo, hi) = if horizontal { (a.0, b.0) } else { (a.1, b.1) };
            for seg in self.placed.iter().flat_map(|path| path.points.windows(2)) {
                let (p, q) = (seg[0], seg[1]);
                let (other, olo, ohi) = if horizontal && is_horizontal(p, q) {
                    (p.1, p.0, q.0)
                } else if !horizontal && is_vertical(p, q) {
                    (p.0, p.1, q.1)
                } else {
                    continue;
                };
                if interval_overlap(lo, hi, olo, ohi) <= EPS {
                    continue;
                }
                if (coord - other).abs() + EPS >= spacing {
                    continue;
                }
                coord = if coord >= other {
                    other + spacing
                } else {
                    other - spacing
                };
            }
            if horizontal {
                out[k].1 = coord;
                out[k + 1].1 = coord;
            } else {
                out[k].0 = coord;
                out[k + 1].0 = coord;
            }
        }
        normalize_path(&out, self.config.grid_size)
    }
}

/// Makes a polyline strictly orthogonal and minimal: diagonal hops get a
/// corner that continues the previous axis, points are snapped to `grid`
/// (when positive) segment by segment, then duplicates and collinear interior points are
/// removed until nothing changes. Endpoints are kept and the result always
/// has at least two points. Running it on its own output is a no-op.
pub fn normalize_path(points: &[Point], grid: f32) -> Vec<Point> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut out: Vec<Point> = Vec::with_capacity(points.len() + 2);
    out.push(first);
    let mut prev_horizontal: Option<bool> = None;
    for &next in &points[1..] {
        let last = out[out.len() - 1];
        if points_equal(last, next) {
            continue;
        }
        if !is_orthogonal_step(last, next) {
            let corner = match prev_horizontal {
                Some(false) => (last.0, next.1),
                _ => (next.0, last.1),
            };
            out.push(corner);
        }
        let from = out[out.len() - 1];
        prev_horizontal = Some(is_horizontal(from, next));
        out.push(next);
    }
    if let Some(&end) = points.last() {
        let last_idx = out.len() - 1;
        if last_idx > 0 && points_equal(out[last_idx], end) {
            out[last_idx] = end;
        }
    }

    if grid > 0.0 {
        out = snap_path(&out, grid);
    }

    loop {
        let before = out.len();
        dedup_keep_ends(&mut out);
        let mut i = 1;
        while i + 1 < out.len() {
            if are_collinear(out[i - 1], out[i], out[i + 1]) {
                out.remove(i);
            } else {
                i += 1;
            }
        }
        if out.len() == before {
            break;
        }
    }
    if out.len() == 1 {
        out.push(out[0]);
    }
    out
}

/// Snaps the first point, then for each step only the coordinate that moves.
/// The shared one is copied from the previous snapped point, so two points a
/// hair apart on either side of a grid midpoint cannot split a segment.
fn snap_path(points: &[Point], grid: f32) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for (i, &point) in points.iter().enumerate() {
        let snapped = match out.last() {
            None => snap_to_grid(point, grid),
            Some(&prev) => {
                let before = points[i - 1];
                if points_equal(before, point) {
                    prev
                } else if is_horizontal(before, point) {
                    (snap_value(point.0, grid), prev.1)
                } else if is_vertical(before, point) {
                    (prev.0, snap_value(point.1, grid))
                } else {
                    snap_to_grid(point, grid)
                }
            }
        };
        out.push(snapped);
    }
    out
}

fn dedup_keep_ends(points: &mut Vec<Point>) {
    if points.len() < 2 {
        return;
    }
    let last = points[points.len() - 1];
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points.iter() {
        match out.last() {
            Some(prev) if points_equal(*prev, point) => {}
            _ => out.push(point),
        }
    }
    let end = out.len() - 1;
    if end > 0 {
        out[end] = last;
    }
    *points = out;
}

pub fn arrival_angle(points: &[Point]) -> f32 {
    match points {
        [.., a, b] => (b.1 - a.1).atan2(b.0 - a.0),
        _ => 0.0,
    }
}

fn stub(point: Point, side: EdgeSide, length: f32) -> Point {
    let (dx, dy) = side.outward();
    (point.0 + dx * length, point.1 + dy * length)
}

fn outward_sign(side: EdgeSide) -> f32 {
    match side {
        EdgeSide::Right | EdgeSide::Bottom => 1.0,
        EdgeSide::Left | EdgeSide::Top => -1.0,
    }
}

/// Coordinate along the side's outward axis (x for left/right).
fn main_coord(point: Point, side: EdgeSide) -> f32 {
    if side.is_vertical() { point.0 } else { point.1 }
}

fn cross_coord(point: Point, side: EdgeSide) -> f32 {
    if side.is_vertical() { point.1 } else { point.0 }
}

fn from_axes(main: f32, cross: f32, side: EdgeSide) -> Point {
    if side.is_vertical() {
        (main, cross)
    } else {
        (cross, main)
    }
}

fn side_extent(rect: &Rect, side: EdgeSide) -> f32 {
    match side {
        EdgeSide::Top => rect.top(),
        EdgeSide::Right => rect.right(),
        EdgeSide::Bottom => rect.bottom(),
        EdgeSide::Left => rect.left(),
    }
}

fn cross_span(rect: &Rect, side: EdgeSide) -> (f32, f32) {
    if side.is_vertical() {
        (rect.top(), rect.bottom())
    } else {
        (rect.left(), rect.right())
    }
}

/// Shrinks by a pixel so paths starting on the border do not count as hits.
fn inset(rect: Rect) -> Rect {
    if rect.width > 2.0 && rect.height > 2.0 {
        rect.inflate(-1.0)
    } else {
        rect
    }
}

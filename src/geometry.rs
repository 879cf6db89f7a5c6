//! Point, segment and rectangle math shared by the layout engines and the
//! router. Everything here is a pure function over `(f32, f32)` points.

use serde::{Deserialize, Serialize};

pub type Point = (f32, f32);
pub type Segment = (Point, Point);

/// Tolerance used when comparing coordinates produced by the router.
pub const EPS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center: Point, width: f32, height: f32) -> Self {
        Self {
            x: center.0 - width / 2.0,
            y: center.1 - height / 2.0,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.0 >= self.x && point.0 <= self.right() && point.1 >= self.y && point.1 <= self.bottom()
    }

    pub fn inflate(&self, pad: f32) -> Rect {
        Rect {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
            height: self.height + pad * 2.0,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Point on the rectangle's border closest to `point`. Points inside the
    /// rectangle are pushed out to the nearest side.
    pub fn closest_border_point(&self, point: Point) -> Point {
        let (px, py) = point;
        if !self.contains(point) {
            return (px.clamp(self.x, self.right()), py.clamp(self.y, self.bottom()));
        }
        let d_left = px - self.x;
        let d_right = self.right() - px;
        let d_top = py - self.y;
        let d_bottom = self.bottom() - py;
        let min = d_left.min(d_right).min(d_top).min(d_bottom);
        if min == d_left {
            (self.x, py)
        } else if min == d_right {
            (self.right(), py)
        } else if min == d_top {
            (px, self.y)
        } else {
            (px, self.bottom())
        }
    }
}

pub fn distance(a: Point, b: Point) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt()
}

pub fn midpoint(a: Point, b: Point) -> Point {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

pub fn points_equal(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() <= EPS && (a.1 - b.1).abs() <= EPS
}

fn orient(a: Point, b: Point, c: Point) -> f32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// True when `a`, `b` and `c` lie on one line. For the axis-aligned paths the
/// router produces this reduces to "all share x" or "all share y".
pub fn are_collinear(a: Point, b: Point, c: Point) -> bool {
    let same_x = (a.0 - b.0).abs() <= EPS && (b.0 - c.0).abs() <= EPS;
    let same_y = (a.1 - b.1).abs() <= EPS && (b.1 - c.1).abs() <= EPS;
    if same_x || same_y {
        return true;
    }
    let scale = distance(a, b).max(distance(b, c)).max(1.0);
    orient(a, b, c).abs() / scale <= EPS
}

pub fn is_horizontal(a: Point, b: Point) -> bool {
    (a.1 - b.1).abs() <= EPS && (a.0 - b.0).abs() > EPS
}

pub fn is_vertical(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() <= EPS && (a.1 - b.1).abs() > EPS
}

/// Adjacent points differ in exactly one axis.
pub fn is_orthogonal_step(a: Point, b: Point) -> bool {
    is_horizontal(a, b) || is_vertical(a, b)
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        let min_x = a.0.min(b.0);
        let max_x = a.0.max(b.0);
        let min_y = a.1.min(b.1);
        let max_y = a.1.max(b.1);
        c.0 >= min_x - 1e-6 && c.0 <= max_x + 1e-6 && c.1 >= min_y - 1e-6 && c.1 <= max_y + 1e-6
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    if o1.abs() <= 1e-6 && on_segment(a, b, c) {
        return true;
    }
    if o2.abs() <= 1e-6 && on_segment(a, b, d) {
        return true;
    }
    if o3.abs() <= 1e-6 && on_segment(c, d, a) {
        return true;
    }
    if o4.abs() <= 1e-6 && on_segment(c, d, b) {
        return true;
    }
    false
}

/// Length of the shared stretch of two collinear segments, 0 otherwise.
pub fn collinear_overlap_length(a: Point, b: Point, c: Point, d: Point) -> f32 {
    let cross1 = orient(a, b, c);
    let cross2 = orient(a, b, d);
    if cross1.abs() > 1e-6 || cross2.abs() > 1e-6 {
        return 0.0;
    }
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq < 1e-6 {
        return 0.0;
    }
    let proj = |p: Point| ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / seg_len_sq;
    let t1 = proj(c);
    let t2 = proj(d);
    let tmin = t1.min(t2);
    let tmax = t1.max(t2);
    let overlap = (tmax.min(1.0) - tmin.max(0.0)).max(0.0);
    overlap * seg_len_sq.sqrt()
}

/// Overlap of the closed intervals `[a0, a1]` and `[b0, b1]` (unordered ends).
pub fn interval_overlap(a0: f32, a1: f32, b0: f32, b1: f32) -> f32 {
    let lo = a0.min(a1).max(b0.min(b1));
    let hi = a0.max(a1).min(b0.max(b1));
    hi - lo
}

pub fn segment_intersects_rect(a: Point, b: Point, rect: &Rect) -> bool {
    let min_x = a.0.min(b.0);
    let max_x = a.0.max(b.0);
    let min_y = a.1.min(b.1);
    let max_y = a.1.max(b.1);
    if max_x < rect.x || min_x > rect.right() || max_y < rect.y || min_y > rect.bottom() {
        return false;
    }
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let corners = [
        (rect.x, rect.y),
        (rect.right(), rect.y),
        (rect.right(), rect.bottom()),
        (rect.x, rect.bottom()),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

pub fn snap_value(value: f32, grid: f32) -> f32 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

pub fn snap_to_grid(point: Point, grid: f32) -> Point {
    (snap_value(point.0, grid), snap_value(point.1, grid))
}

pub fn ray_ellipse_intersection(
    origin: Point,
    dir: Point,
    center: Point,
    rx: f32,
    ry: f32,
) -> Option<Point> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let (dx, dy) = dir;
    let ox = origin.0 - center.0;
    let oy = origin.1 - center.1;
    let a = (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry);
    let b = 2.0 * ((ox * dx) / (rx * rx) + (oy * dy) / (ry * ry));
    let c = (ox * ox) / (rx * rx) + (oy * oy) / (ry * ry) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < 1e-6 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let t = if t1 >= 0.0 {
        t1
    } else if t2 >= 0.0 {
        t2
    } else {
        return None;
    };
    Some((origin.0 + dx * t, origin.1 + dy * t))
}

pub fn path_length(points: &[Point]) -> f32 {
    points.windows(2).map(|seg| distance(seg[0], seg[1])).sum()
}

pub fn path_bend_count(points: &[Point]) -> usize {
    if points.len() < 3 {
        return 0;
    }
    let mut bends = 0usize;
    for idx in 1..points.len() - 1 {
        let p0 = points[idx - 1];
        let p1 = points[idx];
        let p2 = points[idx + 1];
        let dx1 = p1.0 - p0.0;
        let dy1 = p1.1 - p0.1;
        let dx2 = p2.0 - p1.0;
        let dy2 = p2.1 - p1.1;
        if (dx1.abs() <= 1e-4 && dy1.abs() <= 1e-4) || (dx2.abs() <= 1e-4 && dy2.abs() <= 1e-4) {
            continue;
        }
        let cross = dx1 * dy2 - dy1 * dx2;
        if cross.abs() > 1e-4 {
            bends += 1;
        }
    }
    bends
}

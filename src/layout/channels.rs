//! Sparse orthogonal channel grid used to bring loop legs out to their lane.
//!
//! Grid lines run along node borders pushed out by the clearance, plus the
//! coordinates of the port stubs and the lane itself. A Dijkstra search over
//! the line crossings, charging path length plus a penalty per turn and per
//! forward segment crossed, finds the cheapest leg from a stub to the lane.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::{EPS, Point, Rect, Segment, segment_intersects_rect, segments_intersect};

/// Grids larger than this give up and let the caller run a straight leg.
const MAX_CHANNEL_CELLS: usize = 60_000;
/// Direction index for the start state, before any move.
const NO_DIR: usize = 4;
const STATES_PER_CELL: usize = 5;

#[derive(Debug, Clone, Copy)]
pub(super) struct LegCosts {
    pub(super) turn: f32,
    pub(super) crossing: f32,
}

/// The line a leg has to reach: `x = at` for a vertical lane, `y = at`
/// otherwise. Grid lines past it (along `sign`) are dropped.
#[derive(Debug, Clone, Copy)]
pub(super) struct LaneLine {
    pub(super) vertical: bool,
    pub(super) at: f32,
    pub(super) sign: f32,
}

impl LaneLine {
    fn reached(&self, point: Point) -> bool {
        (self.main(point) - self.at).abs() <= EPS
    }

    fn main(&self, point: Point) -> f32 {
        if self.vertical { point.0 } else { point.1 }
    }

    fn admits(&self, main: f32) -> bool {
        self.sign * main <= self.sign * self.at + EPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    cost: f32,
    state: usize,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost; state breaks ties so the search is deterministic.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.state.cmp(&self.state))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(super) struct ChannelGrid<'a> {
    xs: Vec<f32>,
    ys: Vec<f32>,
    blockers: &'a [Rect],
    forward: &'a [Segment],
    lane: LaneLine,
}

impl<'a> ChannelGrid<'a> {
    /// `blockers` are already shrunk so paths hugging a border do not hit
    /// them; the grid lines sit `clearance` outside each one.
    pub(super) fn new(
        blockers: &'a [Rect],
        forward: &'a [Segment],
        anchors: &[Point],
        lane: LaneLine,
        clearance: f32,
    ) -> Option<Self> {
        let mut xs = Vec::with_capacity(blockers.len() * 2 + anchors.len() + 1);
        let mut ys = Vec::with_capacity(blockers.len() * 2 + anchors.len() + 1);
        for rect in blockers {
            xs.push(rect.left() - clearance);
            xs.push(rect.right() + clearance);
            ys.push(rect.top() - clearance);
            ys.push(rect.bottom() + clearance);
        }
        for point in anchors {
            xs.push(point.0);
            ys.push(point.1);
        }
        if lane.vertical {
            xs.push(lane.at);
            xs.retain(|x| lane.admits(*x));
        } else {
            ys.push(lane.at);
            ys.retain(|y| lane.admits(*y));
        }
        let xs = sorted_lines(xs);
        let ys = sorted_lines(ys);
        if xs.is_empty() || ys.is_empty() || xs.len() * ys.len() > MAX_CHANNEL_CELLS {
            return None;
        }
        Some(Self {
            xs,
            ys,
            blockers,
            forward,
            lane,
        })
    }

    fn cell_of(&self, point: Point) -> Option<usize> {
        let ix = self.xs.iter().position(|x| (x - point.0).abs() <= EPS)?;
        let iy = self.ys.iter().position(|y| (y - point.1).abs() <= EPS)?;
        Some(iy * self.xs.len() + ix)
    }

    fn point_of(&self, cell: usize) -> Point {
        let cols = self.xs.len();
        (self.xs[cell % cols], self.ys[cell / cols])
    }

    fn neighbor(&self, cell: usize, dir: usize) -> Option<usize> {
        let cols = self.xs.len();
        let (ix, iy) = (cell % cols, cell / cols);
        let (nx, ny) = match dir {
            0 => (ix + 1, iy),
            1 => (ix.checked_sub(1)?, iy),
            2 => (ix, iy + 1),
            _ => (ix, iy.checked_sub(1)?),
        };
        if nx >= cols || ny >= self.ys.len() {
            return None;
        }
        Some(ny * cols + nx)
    }

    fn step_cost(&self, a: Point, b: Point, costs: LegCosts) -> Option<f32> {
        if self
            .blockers
            .iter()
            .any(|rect| segment_intersects_rect(a, b, rect))
        {
            return None;
        }
        let crossings = self
            .forward
            .iter()
            .filter(|(p, q)| segments_intersect(a, b, *p, *q))
            .count();
        Some((b.0 - a.0).abs() + (b.1 - a.1).abs() + crossings as f32 * costs.crossing)
    }

    /// Cheapest path from `start` (which must sit on the grid) to any point
    /// on the lane line, or `None` when the lane cannot be reached.
    pub(super) fn leg_to_lane(&self, start: Point, costs: LegCosts) -> Option<Vec<Point>> {
        let start_cell = self.cell_of(start)?;
        let states = self.xs.len() * self.ys.len() * STATES_PER_CELL;
        let mut best = vec![f32::INFINITY; states];
        let mut prev: Vec<Option<usize>> = vec![None; states];
        let mut heap = BinaryHeap::new();

        let start_state = start_cell * STATES_PER_CELL + NO_DIR;
        best[start_state] = 0.0;
        heap.push(Entry {
            cost: 0.0,
            state: start_state,
        });

        let mut goal = None;
        while let Some(Entry { cost, state }) = heap.pop() {
            if cost > best[state] {
                continue;
            }
            let cell = state / STATES_PER_CELL;
            let here = self.point_of(cell);
            if self.lane.reached(here) {
                goal = Some(state);
                break;
            }
            let dir = state % STATES_PER_CELL;
            for next_dir in 0..4 {
                let Some(next_cell) = self.neighbor(cell, next_dir) else {
                    continue;
                };
                let there = self.point_of(next_cell);
                let Some(step) = self.step_cost(here, there, costs) else {
                    continue;
                };
                let turn = if dir != NO_DIR && dir != next_dir {
                    costs.turn
                } else {
                    0.0
                };
                let next_state = next_cell * STATES_PER_CELL + next_dir;
                let next_cost = cost + step + turn;
                if next_cost < best[next_state] {
                    best[next_state] = next_cost;
                    prev[next_state] = Some(state);
                    heap.push(Entry {
                        cost: next_cost,
                        state: next_state,
                    });
                }
            }
        }

        let mut state = goal?;
        let mut points = vec![self.point_of(state / STATES_PER_CELL)];
        while let Some(before) = prev[state] {
            points.push(self.point_of(before / STATES_PER_CELL));
            state = before;
        }
        points.reverse();
        Some(points)
    }
}

fn sorted_lines(mut values: Vec<f32>) -> Vec<f32> {
    values.retain(|v| v.is_finite());
    values.sort_by(f32::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() <= EPS);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const COSTS: LegCosts = LegCosts {
        turn: 20.0,
        crossing: 400.0,
    };

    fn lane_at(x: f32) -> LaneLine {
        LaneLine {
            vertical: true,
            at: x,
            sign: 1.0,
        }
    }

    #[test]
    fn open_leg_runs_straight() {
        let grid = ChannelGrid::new(&[], &[], &[(0.0, 0.0)], lane_at(100.0), 20.0).unwrap();
        let leg = grid.leg_to_lane((0.0, 0.0), COSTS).unwrap();
        assert_eq!(leg, vec![(0.0, 0.0), (100.0, 0.0)]);
    }

    #[test]
    fn leg_steps_around_a_blocker() {
        let blockers = [Rect::new(40.0, -30.0, 40.0, 60.0)];
        let grid =
            ChannelGrid::new(&blockers, &[], &[(0.0, 0.0)], lane_at(200.0), 20.0).unwrap();
        let leg = grid.leg_to_lane((0.0, 0.0), COSTS).unwrap();
        assert_eq!(leg.first(), Some(&(0.0, 0.0)));
        assert_eq!(leg.last().map(|p| p.0), Some(200.0));
        for seg in leg.windows(2) {
            assert!(!segment_intersects_rect(seg[0], seg[1], &blockers[0]));
        }
    }

    #[test]
    fn crossing_a_forward_segment_costs_a_detour() {
        // A forward edge cuts the direct row; going around it is cheaper.
        let forward = [((60.0, -10.0), (60.0, 10.0))];
        let grid = ChannelGrid::new(
            &[],
            &forward,
            &[(0.0, 0.0), (0.0, 40.0)],
            lane_at(200.0),
            20.0,
        )
        .unwrap();
        let leg = grid.leg_to_lane((0.0, 0.0), COSTS).unwrap();
        for seg in leg.windows(2) {
            assert!(!segments_intersect(seg[0], seg[1], forward[0].0, forward[0].1));
        }
    }

    #[test]
    fn lines_past_the_lane_are_dropped() {
        let blockers = [Rect::new(300.0, -30.0, 40.0, 60.0)];
        let grid =
            ChannelGrid::new(&blockers, &[], &[(0.0, 0.0)], lane_at(100.0), 20.0).unwrap();
        assert!(grid.xs.iter().all(|x| *x <= 100.0));
    }

    #[test]
    fn off_grid_start_has_no_leg() {
        let grid = ChannelGrid::new(&[], &[], &[(0.0, 0.0)], lane_at(100.0), 20.0).unwrap();
        assert!(grid.leg_to_lane((5.0, 5.0), COSTS).is_none());
    }
}

//! Fan-out of several connectors sharing one node side.

use std::cmp::Ordering;

use crate::geometry::Point;
use crate::ir::EdgeIdx;

use super::EdgeSide;

/// Spacing used once the group outgrows the fixed table.
const FAN_OUT_STEP: f32 = 40.0;

/// Symmetric offsets (pixels along the side) for `count` connectors.
pub fn fan_out_offsets(count: usize) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        2 => vec![-60.0, 60.0],
        3 => vec![-70.0, 0.0, 70.0],
        4 => vec![-90.0, -30.0, 30.0, 90.0],
        5 => vec![-100.0, -50.0, 0.0, 50.0, 100.0],
        n => {
            let half = (n - 1) as f32 / 2.0;
            (0..n).map(|i| (i as f32 - half) * FAN_OUT_STEP).collect()
        }
    }
}

/// A connector attached to a side, with the center of the node at its other
/// end. Ordering along the side follows that remote center so neighbouring
/// connectors do not cross.
#[derive(Debug, Clone)]
pub struct SideOccupant {
    pub edge: EdgeIdx,
    pub edge_id: String,
    pub other: Point,
}

/// Pair each occupant with its offset: sorted by the remote endpoint's
/// coordinate along the side (x for top/bottom, y for left/right).
pub fn assign_offsets(side: EdgeSide, occupants: &[SideOccupant]) -> Vec<(EdgeIdx, f32)> {
    let mut order: Vec<&SideOccupant> = occupants.iter().collect();
    order.sort_by(|a, b| {
        let (ka, kb) = if side.is_vertical() {
            (a.other.1, b.other.1)
        } else {
            (a.other.0, b.other.0)
        };
        ka.partial_cmp(&kb)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.edge.cmp(&b.edge))
    });
    order
        .into_iter()
        .zip(fan_out_offsets(occupants.len()))
        .map(|(occ, offset)| (occ.edge, offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(edge: usize, other: Point) -> SideOccupant {
        SideOccupant {
            edge: EdgeIdx(edge),
            edge_id: format!("e{edge}"),
            other,
        }
    }

    #[test]
    fn table_is_symmetric() {
        for n in 1..9 {
            let offsets = fan_out_offsets(n);
            assert_eq!(offsets.len(), n);
            let sum: f32 = offsets.iter().sum();
            assert!(sum.abs() < 1e-3, "n={n} offsets not centered: {offsets:?}");
        }
        assert_eq!(fan_out_offsets(2), vec![-60.0, 60.0]);
        assert_eq!(fan_out_offsets(3), vec![-70.0, 0.0, 70.0]);
    }

    #[test]
    fn bottom_side_orders_by_remote_x() {
        let occupants = vec![occ(0, (300.0, 200.0)), occ(1, (-300.0, 200.0)), occ(2, (0.0, 200.0))];
        let offsets = assign_offsets(EdgeSide::Bottom, &occupants);
        assert_eq!(
            offsets,
            vec![(EdgeIdx(1), -70.0), (EdgeIdx(2), 0.0), (EdgeIdx(0), 70.0)]
        );
    }

    #[test]
    fn right_side_orders_by_remote_y() {
        let occupants = vec![occ(4, (200.0, 50.0)), occ(3, (200.0, -50.0))];
        let offsets = assign_offsets(EdgeSide::Right, &occupants);
        assert_eq!(offsets, vec![(EdgeIdx(3), -60.0), (EdgeIdx(4), 60.0)]);
    }
}

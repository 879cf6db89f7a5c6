use crate::geometry::{Point, distance, midpoint};

use super::{EdgeLayout, LabelPlacement};

/// Anchors a label at the midpoint of the longest segment, pushed `offset`
/// along its normal: up for horizontal segments, right for vertical ones.
/// Equal lengths keep the earliest segment.
pub fn place_label(points: &[Point], offset: f32) -> Option<LabelPlacement> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, seg) in points.windows(2).enumerate() {
        let len = distance(seg[0], seg[1]);
        if best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((idx, len));
        }
    }
    let (segment_index, _) = best?;
    let (a, b) = (points[segment_index], points[segment_index + 1]);
    let direction = if (b.0 - a.0).abs() >= (b.1 - a.1).abs() {
        (0.0, -1.0)
    } else {
        (1.0, 0.0)
    };
    let mid = midpoint(a, b);
    Some(LabelPlacement {
        position: (mid.0 + direction.0 * offset, mid.1 + direction.1 * offset),
        direction,
        segment_index,
    })
}

/// Fills `label_anchor` for every labeled edge.
pub(super) fn resolve_label_positions(edges: &mut [EdgeLayout], offset: f32) {
    for edge in edges.iter_mut() {
        edge.label_anchor = match edge.label {
            Some(_) => place_label(&edge.points, offset),
            None => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_longest_segment() {
        let points = [(0.0, 0.0), (0.0, 10.0), (100.0, 10.0), (100.0, 40.0)];
        let label = place_label(&points, 12.0).unwrap();
        assert_eq!(label.segment_index, 1);
        assert_eq!(label.direction, (0.0, -1.0));
        assert_eq!(label.position, (50.0, -2.0));
    }

    #[test]
    fn ties_keep_earliest_segment() {
        let points = [(0.0, 0.0), (0.0, 50.0), (50.0, 50.0)];
        let label = place_label(&points, 10.0).unwrap();
        assert_eq!(label.segment_index, 0);
        assert_eq!(label.direction, (1.0, 0.0));
        assert_eq!(label.position, (10.0, 25.0));
    }

    #[test]
    fn needs_a_segment() {
        assert!(place_label(&[(1.0, 1.0)], 10.0).is_none());
        assert!(place_label(&[], 10.0).is_none());
    }
}

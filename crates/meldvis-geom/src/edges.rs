//! Parallel-edge fan-out and flight arcs.

use crate::Point;

/// Perpendicular offset of the `ordinal`-th of `count` parallel edges.
///
/// Offsets are `spacing * (ordinal - (count - 1) / 2)`, so the set is
/// symmetric around the straight center line: a single edge gets 0, two
/// edges get ±spacing/2, three get -spacing, 0, +spacing.
pub fn multi_edge_offset(count: usize, ordinal: usize, spacing: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    spacing * (ordinal as f64 - (count as f64 - 1.0) / 2.0)
}

/// Shift the segment `p1→p2` sideways by `offset` along its left-hand normal.
pub fn offset_segment(p1: Point, p2: Point, offset: f64) -> (Point, Point) {
    let shift = (p2 - p1).perpendicular() * offset;
    (p1 + shift, p2 + shift)
}

/// Height of the flight arc at progress `t ∈ [0, 1]`.
///
/// `f(t) = k1 - k2·(t - ½)²` with `k1 = height` and `k2 = 4·height`: zero at
/// both endpoints, peaking at `height` halfway. Values of `t` outside the
/// unit interval are clamped.
pub fn arc_lift(t: f64, height: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let k1 = height;
    let k2 = 4.0 * height;
    k1 - k2 * (t - 0.5) * (t - 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_edge_is_centered() {
        assert_eq!(multi_edge_offset(1, 0, 10.0), 0.0);
    }

    #[test]
    fn three_edges_fan_out() {
        let offsets: Vec<_> = (0..3).map(|i| multi_edge_offset(3, i, 10.0)).collect();
        assert_eq!(offsets, vec![-10.0, 0.0, 10.0]);
    }

    #[test]
    fn offset_segment_keeps_direction() {
        let (a, b) = offset_segment(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 2.0);
        assert_eq!(a, Point::new(0.0, 2.0));
        assert_eq!(b, Point::new(10.0, 2.0));
    }

    #[test]
    fn arc_endpoints_and_peak() {
        assert_eq!(arc_lift(0.0, 20.0), 0.0);
        assert_eq!(arc_lift(1.0, 20.0), 0.0);
        assert_eq!(arc_lift(0.5, 20.0), 20.0);
        assert_eq!(arc_lift(0.25, 20.0), arc_lift(0.75, 20.0));
    }

    proptest! {
        #[test]
        fn offsets_are_symmetric(count in 1usize..32, spacing in 0.1f64..50.0) {
            let sum: f64 = (0..count).map(|i| multi_edge_offset(count, i, spacing)).sum();
            prop_assert!(sum.abs() < 1e-6);
            for i in 0..count {
                let a = multi_edge_offset(count, i, spacing);
                let b = multi_edge_offset(count, count - 1 - i, spacing);
                prop_assert!((a + b).abs() < 1e-9);
            }
        }

        #[test]
        fn parallel_edges_never_overlap(count in 2usize..16, spacing in 0.1f64..50.0) {
            for i in 1..count {
                let gap = multi_edge_offset(count, i, spacing) - multi_edge_offset(count, i - 1, spacing);
                prop_assert!((gap - spacing).abs() < 1e-9);
            }
        }
    }
}

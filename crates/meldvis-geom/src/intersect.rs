//! Segment intersection tests.

use crate::{Point, PARALLEL_EPSILON};

/// 2D cross product (z component of the 3D cross).
#[inline]
fn cross(a: Point, b: Point) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Intersection of segment `p1→p2` with segment `p3→p4`.
///
/// Returns `None` when the segments are parallel (|det| below
/// [`PARALLEL_EPSILON`]) or when the crossing lies outside either segment.
/// The returned point is computed along `p3→p4`, so a hit on an
/// axis-aligned second segment lies exactly on it.
pub fn line_intersects_line(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let d = p2 - p1;
    let e = p4 - p3;
    let det = cross(d, e);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }

    let w = p3 - p1;
    let t = cross(w, e) / det;
    let u = cross(w, d) / det;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some(p3 + e * u)
}

/// First crossing of segment `p1→p2` with the border of the box at `origin`
/// (top-left corner) of size `w × h`.
///
/// Edges are tested in a fixed order: top, right, bottom, left. A segment
/// that never crosses the border (entirely outside or entirely inside)
/// yields `None`.
pub fn line_intersects_box(p1: Point, p2: Point, origin: Point, w: f64, h: f64) -> Option<Point> {
    let top_left = origin;
    let top_right = Point::new(origin.x + w, origin.y);
    let bottom_right = Point::new(origin.x + w, origin.y + h);
    let bottom_left = Point::new(origin.x, origin.y + h);

    let edges = [
        (top_left, top_right),
        (top_right, bottom_right),
        (bottom_left, bottom_right),
        (bottom_left, top_left),
    ];

    edges
        .iter()
        .find_map(|&(a, b)| line_intersects_line(p1, p2, a, b))
}

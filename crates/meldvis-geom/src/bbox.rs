//! Axis-aligned bounding boxes and viewport easing.

use crate::Point;

/// An axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Point::new(-1.0, -1.0), Point::new(1.0, 1.0))
    }
}

impl BoundingBox {
    /// Create a box from two corners, normalizing their order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Smallest box containing every point, grown by `margin` on each side.
    ///
    /// Returns `None` when there are no points.
    pub fn around<I>(points: I, margin: f64) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        });
        let pad = Point::new(margin, margin);
        Some(Self {
            min: min - pad,
            max: max + pad,
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(self.max)
    }

    /// Move each corner `rate` of the remaining distance toward `target`.
    ///
    /// `rate` is clamped to `[0, 1]`, so a corner never passes its target.
    /// Repeated calls converge asymptotically.
    pub fn ease_toward(&mut self, target: &BoundingBox, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        self.min = self.min.lerp(target.min, rate);
        self.max = self.max.lerp(target.max, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_EASE_RATE;
    use proptest::prelude::*;

    #[test]
    fn around_empty_is_none() {
        assert!(BoundingBox::around(std::iter::empty(), 1.0).is_none());
    }

    #[test]
    fn around_adds_margin() {
        let bbox = BoundingBox::around(
            [Point::new(0.0, 0.0), Point::new(10.0, 5.0), Point::new(3.0, -2.0)],
            1.0,
        )
        .unwrap();
        assert_eq!(bbox.min, Point::new(-1.0, -3.0));
        assert_eq!(bbox.max, Point::new(11.0, 6.0));
        assert_eq!(bbox.width(), 12.0);
        assert_eq!(bbox.height(), 9.0);
    }

    #[test]
    fn ease_covers_a_tenth() {
        let mut current = BoundingBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let target = BoundingBox::new(Point::new(-10.0, 0.0), Point::new(20.0, 10.0));
        current.ease_toward(&target, DEFAULT_EASE_RATE);
        assert!((current.min.x - -1.0).abs() < 1e-12);
        assert!((current.max.x - 11.0).abs() < 1e-12);
    }

    #[test]
    fn ease_converges_without_reaching() {
        let mut current = BoundingBox::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let target = BoundingBox::new(Point::new(-100.0, -100.0), Point::new(100.0, 100.0));
        for _ in 0..200 {
            current.ease_toward(&target, DEFAULT_EASE_RATE);
        }
        assert!((current.max.x - 100.0).abs() < 1e-6);
        assert!(current.max.x < 100.0);
    }

    proptest! {
        #[test]
        fn ease_never_overshoots(
            cx in -1e3f64..1e3, tx in -1e3f64..1e3,
            cy in -1e3f64..1e3, ty in -1e3f64..1e3,
            rate in -1.0f64..2.0,
        ) {
            let mut current = BoundingBox::new(Point::new(cx, cy), Point::new(cx + 1.0, cy + 1.0));
            let before = current;
            let target = BoundingBox::new(Point::new(tx, ty), Point::new(tx + 5.0, ty + 5.0));
            current.ease_toward(&target, rate);

            let lo = before.min.x.min(target.min.x);
            let hi = before.min.x.max(target.min.x);
            prop_assert!(current.min.x >= lo - 1e-9 && current.min.x <= hi + 1e-9);
            let lo = before.max.y.min(target.max.y);
            let hi = before.max.y.max(target.max.y);
            prop_assert!(current.max.y >= lo - 1e-9 && current.max.y <= hi + 1e-9);
        }
    }
}

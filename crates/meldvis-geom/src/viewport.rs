//! World ↔ screen transform.

use crate::{BoundingBox, Point};

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Maps the (eased) world bounding box onto the canvas.
///
/// The map is a uniform scale plus translation: the whole box fits inside the
/// canvas and is centered on it, aspect ratio preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bbox: BoundingBox,
    pub canvas: CanvasSize,
}

impl Viewport {
    pub fn new(bbox: BoundingBox, canvas: CanvasSize) -> Self {
        Self { bbox, canvas }
    }

    /// Pixels per world unit.
    ///
    /// A box with no extent along an axis does not constrain that axis; a
    /// box with no extent at all maps at unit scale.
    pub fn scale(&self) -> f64 {
        let sx = (self.bbox.width() > 0.0).then(|| self.canvas.width / self.bbox.width());
        let sy = (self.bbox.height() > 0.0).then(|| self.canvas.height / self.bbox.height());
        match (sx, sy) {
            (Some(sx), Some(sy)) => sx.min(sy),
            (Some(s), None) | (None, Some(s)) => s,
            (None, None) => 1.0,
        }
    }

    /// World position → canvas pixels.
    pub fn world_to_screen(&self, p: Point) -> Point {
        (p - self.bbox.center()) * self.scale() + self.canvas.center()
    }

    /// Canvas pixels → world position.
    pub fn screen_to_world(&self, p: Point) -> Point {
        (p - self.canvas.center()) * (1.0 / self.scale()) + self.bbox.center()
    }
}

//! Meldvis Geometry Kernel
//!
//! Pure 2D math behind the execution graph view. Nothing in this crate owns
//! state beyond its arguments; every function is deterministic.
//!
//! # Pieces
//!
//! - [`Point`]: world or screen position with vector arithmetic
//! - [`BoundingBox`]: auto-fit box and the per-tick easing toward a target
//! - [`Viewport`]: affine map between the eased box and canvas pixels
//! - [`line_intersects_line`] / [`line_intersects_box`]: segment clipping so
//!   an edge stops at its destination node's border instead of its center
//! - [`multi_edge_offset`] / [`offset_segment`]: symmetric fan-out of
//!   parallel edges between the same node pair
//! - [`arc_lift`]: the parabolic lift of an in-flight message glyph

mod bbox;
mod edges;
mod intersect;
mod point;
mod viewport;

pub use bbox::BoundingBox;
pub use edges::{arc_lift, multi_edge_offset, offset_segment};
pub use intersect::{line_intersects_box, line_intersects_line};
pub use point::Point;
pub use viewport::{CanvasSize, Viewport};

/// Determinants smaller than this are treated as parallel segments.
pub const PARALLEL_EPSILON: f64 = 1e-9;

/// Fraction of the remaining distance covered per easing tick.
pub const DEFAULT_EASE_RATE: f64 = 0.1;

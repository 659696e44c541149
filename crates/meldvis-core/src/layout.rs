//! Node placement.
//!
//! The graph view only needs three things from a layout: a world position
//! per node, a "nearest node" query for picking, and a `step` the redraw
//! tick calls once per frame. [`Layout`] is that seam; force-directed
//! solvers plug in behind it. [`SpiralLayout`] is the built-in deterministic
//! placement.

use std::collections::HashMap;
use std::f64::consts::TAU;

use meldvis_geom::Point;

use crate::ids::RuntimeNodeId;

/// Distance between consecutive rings, in world units.
pub const DEFAULT_RING_SPACING: f64 = 80.0;
/// Fraction of the remaining distance a node moves toward its slot per step.
pub const DEFAULT_SETTLE_RATE: f64 = 0.2;
/// A node this close to its slot snaps onto it.
const SETTLE_EPSILON: f64 = 0.01;

/// Placement collaborator driven by the session.
pub trait Layout: Send {
    /// Start tracking a node. Inserting a known node is a no-op.
    fn insert(&mut self, id: RuntimeNodeId);

    /// Current world position of a node.
    fn position(&self, id: RuntimeNodeId) -> Option<Point>;

    /// Node closest to `point`, if any node is placed.
    fn nearest(&self, point: Point) -> Option<RuntimeNodeId>;

    /// Note a relationship between two nodes. Layouts without springs ignore
    /// it.
    fn connect(&mut self, _a: RuntimeNodeId, _b: RuntimeNodeId) {}

    /// Forget every node.
    fn clear(&mut self);

    /// Advance one frame.
    fn step(&mut self);

    /// Whether another `step` would leave every node where it is.
    fn is_settled(&self) -> bool {
        true
    }

    /// Every placed node with its position.
    fn positions(&self) -> Vec<(RuntimeNodeId, Point)>;
}

/// Slot `index` on hexagonal rings: slot 0 is the origin, ring `n` holds
/// `6n` slots evenly spread on a circle of radius `n * spacing`.
pub fn spiral_slot(index: u64, spacing: f64) -> Point {
    if index == 0 {
        return Point::ORIGIN;
    }
    // Slots through ring n: 1 + 3n(n+1)
    let mut ring = 1u64;
    while 1 + 3 * ring * (ring + 1) <= index {
        ring += 1;
    }
    let first = 1 + 3 * (ring - 1) * ring;
    let offset = index - first;
    let angle = TAU * offset as f64 / (6 * ring) as f64;
    let radius = ring as f64 * spacing;
    Point::new(radius * angle.cos(), radius * angle.sin())
}

#[derive(Debug, Clone, Copy)]
struct Placed {
    slot: Point,
    current: Point,
}

/// Places nodes on spiral slots in insertion order. New nodes start at the
/// origin and settle onto their slot over a few steps.
#[derive(Debug)]
pub struct SpiralLayout {
    spacing: f64,
    settle_rate: f64,
    order: Vec<RuntimeNodeId>,
    placed: HashMap<RuntimeNodeId, Placed>,
}

impl Default for SpiralLayout {
    fn default() -> Self {
        Self::new(DEFAULT_RING_SPACING, DEFAULT_SETTLE_RATE)
    }
}

impl SpiralLayout {
    pub fn new(spacing: f64, settle_rate: f64) -> Self {
        Self {
            spacing,
            settle_rate: settle_rate.clamp(0.0, 1.0),
            order: Vec::new(),
            placed: HashMap::new(),
        }
    }

    /// Final position of a node once it has settled.
    pub fn slot(&self, id: RuntimeNodeId) -> Option<Point> {
        self.placed.get(&id).map(|p| p.slot)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Layout for SpiralLayout {
    fn insert(&mut self, id: RuntimeNodeId) {
        if self.placed.contains_key(&id) {
            return;
        }
        let slot = spiral_slot(self.order.len() as u64, self.spacing);
        self.order.push(id);
        self.placed.insert(
            id,
            Placed {
                slot,
                current: Point::ORIGIN,
            },
        );
    }

    fn position(&self, id: RuntimeNodeId) -> Option<Point> {
        self.placed.get(&id).map(|p| p.current)
    }

    fn nearest(&self, point: Point) -> Option<RuntimeNodeId> {
        self.order
            .iter()
            .filter_map(|id| self.placed.get(id).map(|p| (*id, p.current.distance(point))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.placed.clear();
    }

    fn step(&mut self) {
        let rate = self.settle_rate;
        for placed in self.placed.values_mut() {
            let next = placed.current.lerp(placed.slot, rate);
            placed.current = if next.distance(placed.slot) < SETTLE_EPSILON {
                placed.slot
            } else {
                next
            };
        }
    }

    fn is_settled(&self) -> bool {
        self.placed.values().all(|p| p.current == p.slot)
    }

    fn positions(&self) -> Vec<(RuntimeNodeId, Point)> {
        self.order
            .iter()
            .filter_map(|id| self.placed.get(id).map(|p| (*id, p.current)))
            .collect()
    }
}

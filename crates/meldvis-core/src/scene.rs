//! Scene builder: one screen-space snapshot per redraw tick.
//!
//! Reads the graph store, the layout and the active flights; owns the eased
//! viewport box. The output [`Scene`] is plain data that presentation
//! clients draw as-is.

use meldvis_geom::{
    line_intersects_box, multi_edge_offset, offset_segment, BoundingBox, CanvasSize, Point,
    Viewport, DEFAULT_EASE_RATE,
};
use serde::Serialize;

use crate::graph::{EdgeHandle, GraphStore, NODE_HEIGHT};
use crate::ids::{DisplayId, RuntimeNodeId};
use crate::layout::Layout;
use crate::scheduler::{Flight, DEFAULT_ARC_HEIGHT};

/// Perpendicular distance between parallel edges, in pixels.
pub const DEFAULT_EDGE_SPACING: f64 = 8.0;
/// World-space margin kept around the outermost nodes.
pub const DEFAULT_FIT_MARGIN: f64 = 40.0;
/// Default canvas size until a client reports its own.
pub const DEFAULT_CANVAS: CanvasSize = CanvasSize::new(960.0, 640.0);
/// Viewport corner movement below which the ease counts as finished.
const VIEWPORT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    pub id: RuntimeNodeId,
    pub display: DisplayId,
    pub color: String,
    /// Box center in canvas pixels.
    pub center: Point,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneEdge {
    pub handle: EdgeHandle,
    pub source: RuntimeNodeId,
    pub dest: RuntimeNodeId,
    pub color: String,
    pub label: Option<String>,
    pub from: Point,
    /// Where the edge meets the destination's border.
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneGlyph {
    pub from: RuntimeNodeId,
    pub to: RuntimeNodeId,
    pub label: String,
    pub position: Point,
    pub progress: f64,
}

/// Everything a presentation client needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    /// Frame counter, monotonically increasing within a process.
    pub frame: u64,
    pub canvas: CanvasSize,
    pub viewport: BoundingBox,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub glyphs: Vec<SceneGlyph>,
}

impl Scene {
    pub fn empty(canvas: CanvasSize) -> Self {
        Self {
            frame: 0,
            canvas,
            viewport: BoundingBox::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            glyphs: Vec::new(),
        }
    }
}

/// Turns graph state into [`Scene`]s and keeps the eased viewport between
/// frames.
#[derive(Debug)]
pub struct SceneBuilder {
    canvas: CanvasSize,
    eased: BoundingBox,
    ease_rate: f64,
    edge_spacing: f64,
    arc_height: f64,
    margin: f64,
    frame: u64,
    settled: bool,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS, DEFAULT_EASE_RATE, DEFAULT_EDGE_SPACING)
    }
}

impl SceneBuilder {
    pub fn new(canvas: CanvasSize, ease_rate: f64, edge_spacing: f64) -> Self {
        Self {
            canvas,
            eased: BoundingBox::default(),
            ease_rate,
            edge_spacing,
            arc_height: DEFAULT_ARC_HEIGHT,
            margin: DEFAULT_FIT_MARGIN,
            frame: 0,
            settled: false,
        }
    }

    pub fn with_arc_height(mut self, arc_height: f64) -> Self {
        self.arc_height = arc_height;
        self
    }

    /// Current world → screen map.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.eased, self.canvas)
    }

    /// Snap the viewport back to its initial box.
    pub fn reset(&mut self) {
        self.eased = BoundingBox::default();
        self.settled = false;
    }

    /// Whether the last build left the viewport where it was.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Compose the frame for the current state, then ease the viewport one
    /// step toward the box that fits every node.
    pub fn build(&mut self, graph: &GraphStore, layout: &dyn Layout, flights: &[Flight]) -> Scene {
        let viewport = self.viewport();
        let screen = |id: RuntimeNodeId| layout.position(id).map(|p| viewport.world_to_screen(p));

        let nodes: Vec<SceneNode> = graph
            .nodes()
            .filter_map(|node| {
                Some(SceneNode {
                    id: node.id,
                    display: node.display,
                    color: node.color.to_hex(),
                    center: screen(node.id)?,
                    width: node.cached_width,
                    height: NODE_HEIGHT,
                })
            })
            .collect();

        let edges = graph
            .edges()
            .filter_map(|(handle, edge)| {
                let src = screen(edge.source)?;
                let dst = screen(edge.dest)?;
                let (from, to) = self.edge_segment(graph, handle, src, dst)?;
                let width = graph.node(edge.dest).map(|n| n.cached_width)?;
                let origin = dst - Point::new(width / 2.0, NODE_HEIGHT / 2.0);
                let to = line_intersects_box(from, to, origin, width, NODE_HEIGHT).unwrap_or(to);
                Some(SceneEdge {
                    handle,
                    source: edge.source,
                    dest: edge.dest,
                    color: edge.color.to_hex(),
                    label: edge.label.clone(),
                    from,
                    to,
                })
            })
            .collect();

        let glyphs = flights
            .iter()
            .filter_map(|flight| {
                let src = screen(flight.from)?;
                let dst = screen(flight.to)?;
                Some(SceneGlyph {
                    from: flight.from,
                    to: flight.to,
                    label: flight.label.clone(),
                    position: flight.position(src, dst, self.arc_height),
                    progress: flight.progress(),
                })
            })
            .collect();

        self.frame += 1;
        let scene = Scene {
            frame: self.frame,
            canvas: self.canvas,
            viewport: self.eased,
            nodes,
            edges,
            glyphs,
        };

        let before = self.eased;
        let placed = layout.positions().into_iter().map(|(_, p)| p);
        if let Some(target) = BoundingBox::around(placed, self.margin) {
            self.eased.ease_toward(&target, self.ease_rate);
        }
        let moved = before
            .min
            .distance(self.eased.min)
            .max(before.max.distance(self.eased.max));
        self.settled = moved < VIEWPORT_EPSILON;
        scene
    }

    /// Offset segment of one edge among all edges joining the same two
    /// nodes in either direction. Offsets are taken along the pair's
    /// canonical direction (lower id first), so edges of opposite
    /// directions land on opposite sides of the center line.
    fn edge_segment(
        &self,
        graph: &GraphStore,
        handle: EdgeHandle,
        src: Point,
        dst: Point,
    ) -> Option<(Point, Point)> {
        let edge = graph.edge(handle)?;
        let (ordinal, forward_count) = graph.ordinal(handle)?;
        let backward_count = if edge.source == edge.dest {
            0
        } else {
            graph.edges_between(edge.dest, edge.source).len()
        };
        let count = forward_count + backward_count;
        let canonical = edge.source <= edge.dest;

        // Lower-id direction takes the first ordinals of the shared group.
        let group_ordinal = if canonical {
            ordinal
        } else {
            backward_count + ordinal
        };
        let offset = multi_edge_offset(count, group_ordinal, self.edge_spacing);

        if canonical {
            Some(offset_segment(src, dst, offset))
        } else {
            let (b, a) = offset_segment(dst, src, offset);
            Some((a, b))
        }
    }
}

//! Graph State Store: the visual nodes and routing edges of the current run.
//!
//! Keyed by runtime identifiers. Knows nothing about animation, layout
//! positions or transport; every operation is a synchronous local mutation
//! that raises the `dirty` flag for the redraw tick.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::ids::{DisplayId, Rgb, RuntimeNodeId};

/// Approximate pixel width of one label character.
pub const LABEL_CHAR_WIDTH: f64 = 8.0;
/// Horizontal padding around a node label.
pub const LABEL_PADDING: f64 = 12.0;
/// Height of a node box.
pub const NODE_HEIGHT: f64 = 22.0;

/// A runtime node as drawn on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualNode {
    pub id: RuntimeNodeId,
    pub display: DisplayId,
    pub color: Rgb,
    /// Box width derived from the display label.
    pub cached_width: f64,
}

impl VisualNode {
    fn new(id: RuntimeNodeId, display: DisplayId) -> Self {
        Self {
            id,
            display,
            color: Rgb::NODE_DEFAULT,
            cached_width: label_width(display),
        }
    }
}

fn label_width(display: DisplayId) -> f64 {
    display.to_string().len() as f64 * LABEL_CHAR_WIDTH + LABEL_PADDING
}

/// Opaque handle to an edge. Handles are never reused within a store, so
/// ordering by handle is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeHandle(u64);

/// Attributes supplied when creating an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAttrs {
    pub color: Rgb,
    pub label: Option<String>,
    /// Fingerprint of the routing fact that created the edge.
    pub fingerprint: String,
}

impl EdgeAttrs {
    pub fn for_fact(fingerprint: impl Into<String>) -> Self {
        Self {
            color: Rgb::EDGE_DEFAULT,
            label: None,
            fingerprint: fingerprint.into(),
        }
    }
}

/// A directed relationship edge drawn for one routing fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualEdge {
    pub source: RuntimeNodeId,
    pub dest: RuntimeNodeId,
    pub color: Rgb,
    pub label: Option<String>,
    pub fingerprint: String,
}

/// Owns every [`VisualNode`] and [`VisualEdge`] of the session.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: BTreeMap<RuntimeNodeId, VisualNode>,
    edges: BTreeMap<EdgeHandle, VisualEdge>,
    /// Parallel edges per ordered pair, in creation order.
    pairs: HashMap<(RuntimeNodeId, RuntimeNodeId), Vec<EdgeHandle>>,
    next_edge: u64,
    dirty: bool,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node and edge.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.pairs.clear();
        self.dirty = true;
    }

    /// Create the node for `id`.
    ///
    /// Returns `false` without creating anything when the id already exists;
    /// the existing node only picks up the newer display id.
    pub fn add_node(&mut self, id: RuntimeNodeId, display: DisplayId) -> bool {
        self.dirty = true;
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.display = display;
                node.cached_width = label_width(display);
                false
            }
            None => {
                self.nodes.insert(id, VisualNode::new(id, display));
                true
            }
        }
    }

    /// Create an edge between two known nodes.
    ///
    /// Returns `None` when either endpoint is not in the store.
    pub fn add_edge(
        &mut self,
        source: RuntimeNodeId,
        dest: RuntimeNodeId,
        attrs: EdgeAttrs,
    ) -> Option<EdgeHandle> {
        if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&dest) {
            return None;
        }

        let handle = EdgeHandle(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(
            handle,
            VisualEdge {
                source,
                dest,
                color: attrs.color,
                label: attrs.label,
                fingerprint: attrs.fingerprint,
            },
        );
        self.pairs.entry((source, dest)).or_default().push(handle);
        self.dirty = true;
        Some(handle)
    }

    /// Remove one edge by handle.
    pub fn remove_edge(&mut self, handle: EdgeHandle) -> Option<VisualEdge> {
        let edge = self.edges.remove(&handle)?;
        let key = (edge.source, edge.dest);
        if let Some(list) = self.pairs.get_mut(&key) {
            list.retain(|h| *h != handle);
            if list.is_empty() {
                self.pairs.remove(&key);
            }
        }
        self.dirty = true;
        Some(edge)
    }

    /// Most recently created edge of the pair carrying `fingerprint`.
    pub fn find_edge(
        &self,
        source: RuntimeNodeId,
        dest: RuntimeNodeId,
        fingerprint: &str,
    ) -> Option<EdgeHandle> {
        self.pairs
            .get(&(source, dest))?
            .iter()
            .rev()
            .copied()
            .find(|h| {
                self.edges
                    .get(h)
                    .map(|e| e.fingerprint == fingerprint)
                    .unwrap_or(false)
            })
    }

    /// Edges from `source` to `dest`, oldest first.
    pub fn edges_between(
        &self,
        source: RuntimeNodeId,
        dest: RuntimeNodeId,
    ) -> Vec<(EdgeHandle, &VisualEdge)> {
        self.pairs
            .get(&(source, dest))
            .map(|list| {
                list.iter()
                    .filter_map(|h| self.edges.get(h).map(|e| (*h, e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Position of an edge among its parallel siblings: `(ordinal, count)`.
    pub fn ordinal(&self, handle: EdgeHandle) -> Option<(usize, usize)> {
        let edge = self.edges.get(&handle)?;
        let list = self.pairs.get(&(edge.source, edge.dest))?;
        let ordinal = list.iter().position(|h| *h == handle)?;
        Some((ordinal, list.len()))
    }

    /// Returns `false` when the node is unknown.
    pub fn set_node_color(&mut self, id: RuntimeNodeId, color: Rgb) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.color = color;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Label every edge from `source` to `dest`; returns how many changed.
    pub fn set_edge_label(&mut self, source: RuntimeNodeId, dest: RuntimeNodeId, label: &str) -> usize {
        let Some(list) = self.pairs.get(&(source, dest)) else {
            return 0;
        };
        let mut count = 0;
        for handle in list {
            if let Some(edge) = self.edges.get_mut(handle) {
                edge.label = Some(label.to_string());
                count += 1;
            }
        }
        if count > 0 {
            self.dirty = true;
        }
        count
    }

    pub fn node(&self, id: RuntimeNodeId) -> Option<&VisualNode> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: RuntimeNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edge(&self, handle: EdgeHandle) -> Option<&VisualEdge> {
        self.edges.get(&handle)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &VisualNode> {
        self.nodes.values()
    }

    /// Edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeHandle, &VisualEdge)> {
        self.edges.iter().map(|(h, e)| (*h, e))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Request a redraw without changing topology.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Read and clear the redraw flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

//! Event Trail: the global and per-node display logs.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::ids::RuntimeNodeId;

/// Default capacity of the global log.
pub const DEFAULT_GLOBAL_CAPACITY: usize = 100;

/// Visual category of a log line; maps to a fixed CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordClass {
    Derive,
    Consume,
    Send,
    Receive,
    SelfLoop,
    Step,
    Rule,
    Program,
    Connection,
    /// Step boundary separator.
    Ruler,
    Info,
}

impl RecordClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            RecordClass::Derive => "derive",
            RecordClass::Consume => "consume",
            RecordClass::Send => "send",
            RecordClass::Receive => "receive",
            RecordClass::SelfLoop => "self-loop",
            RecordClass::Step => "step",
            RecordClass::Rule => "rule",
            RecordClass::Program => "program",
            RecordClass::Connection => "connection",
            RecordClass::Ruler => "ruler",
            RecordClass::Info => "info",
        }
    }
}

/// One display-only log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub text: String,
    #[serde(rename = "cssClass")]
    pub class: RecordClass,
}

impl EventRecord {
    pub fn new(text: impl Into<String>, class: RecordClass) -> Self {
        Self {
            text: text.into(),
            class,
        }
    }

    pub fn ruler() -> Self {
        Self::new(String::new(), RecordClass::Ruler)
    }

    pub fn is_ruler(&self) -> bool {
        self.class == RecordClass::Ruler
    }
}

/// Global (bounded) and per-node (unbounded) logs plus the selection they
/// are rendered against.
#[derive(Debug)]
pub struct EventTrail {
    /// Newest first.
    global: VecDeque<EventRecord>,
    capacity: usize,
    /// Insertion order, oldest first.
    per_node: HashMap<RuntimeNodeId, Vec<EventRecord>>,
    selected: Option<RuntimeNodeId>,
    /// Entries for the selected node not yet picked up by a client.
    live: Vec<EventRecord>,
}

impl Default for EventTrail {
    fn default() -> Self {
        Self::new(DEFAULT_GLOBAL_CAPACITY)
    }
}

impl EventTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            global: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            per_node: HashMap::new(),
            selected: None,
            live: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert at the front of the global log, evicting the oldest entry when
    /// over capacity.
    pub fn append_global(&mut self, text: impl Into<String>, class: RecordClass) {
        self.push_global(EventRecord::new(text, class));
    }

    fn push_global(&mut self, record: EventRecord) {
        self.global.push_front(record);
        while self.global.len() > self.capacity {
            self.global.pop_back();
        }
    }

    /// Append to a node's log; mirrored to the live feed when that node is
    /// selected.
    pub fn append_node(&mut self, id: RuntimeNodeId, text: impl Into<String>, class: RecordClass) {
        self.push_node(id, EventRecord::new(text, class));
    }

    fn push_node(&mut self, id: RuntimeNodeId, record: EventRecord) {
        if self.selected == Some(id) {
            self.live.push(record.clone());
        }
        self.per_node.entry(id).or_default().push(record);
    }

    /// Step-boundary marker in the global log.
    pub fn ruler_global(&mut self) {
        self.push_global(EventRecord::ruler());
    }

    /// Step-boundary marker in a node's log.
    pub fn ruler_node(&mut self, id: RuntimeNodeId) {
        self.push_node(id, EventRecord::ruler());
    }

    /// Global log, newest first.
    pub fn global(&self) -> impl Iterator<Item = &EventRecord> {
        self.global.iter()
    }

    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    /// Full per-node log replayed newest first. Unknown nodes yield nothing.
    pub fn render_selected(&self, id: RuntimeNodeId) -> Vec<&EventRecord> {
        self.per_node
            .get(&id)
            .map(|log| log.iter().rev().collect())
            .unwrap_or_default()
    }

    pub fn node_len(&self, id: RuntimeNodeId) -> usize {
        self.per_node.get(&id).map(Vec::len).unwrap_or(0)
    }

    /// Change the selected node. Pending live entries belong to the old
    /// selection and are dropped.
    pub fn select(&mut self, id: Option<RuntimeNodeId>) {
        if self.selected != id {
            self.live.clear();
        }
        self.selected = id;
    }

    pub fn selected(&self) -> Option<RuntimeNodeId> {
        self.selected
    }

    /// Drain entries appended to the selected node since the last call.
    pub fn take_live(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.live)
    }

    /// Forget every per-node log. The global log and the selection stay.
    pub fn clear_nodes(&mut self) {
        self.per_node.clear();
        self.live.clear();
    }

    pub fn reset(&mut self) {
        self.global.clear();
        self.per_node.clear();
        self.live.clear();
        self.selected = None;
    }
}

//! Wire protocol: inbound runtime events and outbound player actions.
//!
//! Inbound messages are JSON objects `{ "type": <tag>, "version": <string>,
//! ...fields }`. Decoding is two-staged so the two failure modes stay
//! distinct: an unknown tag is [`Error::UnknownEvent`] (fatal), a known tag
//! with a bad payload is [`Error::MalformedPayload`] (drop the event).

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ids::{DisplayId, RuntimeNodeId};
use crate::program::{PredicateDescriptor, QueuedTuple, Tuple};

/// Entry of the `database` node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: RuntimeNodeId,
    pub display_id: DisplayId,
}

/// Every event kind the runtime can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    ProgramRunning,
    ProgramStopped,
    Database,
    Program,
    RuleSet,
    PersistentDerivation,
    LinearDerivation,
    TupleSend,
    LinearConsumption,
    StepStart,
    StepDone,
    NodeInfo,
    ChangedSelectedNode,
    ProgramTermination,
    SetNodeColor,
    SetEdgeLabel,
    RuleStart,
    RuleApplied,
    NewNode,
}

impl EventKind {
    pub const ALL: [EventKind; 20] = [
        EventKind::Init,
        EventKind::ProgramRunning,
        EventKind::ProgramStopped,
        EventKind::Database,
        EventKind::Program,
        EventKind::RuleSet,
        EventKind::PersistentDerivation,
        EventKind::LinearDerivation,
        EventKind::TupleSend,
        EventKind::LinearConsumption,
        EventKind::StepStart,
        EventKind::StepDone,
        EventKind::NodeInfo,
        EventKind::ChangedSelectedNode,
        EventKind::ProgramTermination,
        EventKind::SetNodeColor,
        EventKind::SetEdgeLabel,
        EventKind::RuleStart,
        EventKind::RuleApplied,
        EventKind::NewNode,
    ];

    /// Wire tag of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::ProgramRunning => "program_running",
            EventKind::ProgramStopped => "program_stopped",
            EventKind::Database => "database",
            EventKind::Program => "program",
            EventKind::RuleSet => "rule_set",
            EventKind::PersistentDerivation => "persistent_derivation",
            EventKind::LinearDerivation => "linear_derivation",
            EventKind::TupleSend => "tuple_send",
            EventKind::LinearConsumption => "linear_consumption",
            EventKind::StepStart => "step_start",
            EventKind::StepDone => "step_done",
            EventKind::NodeInfo => "node_info",
            EventKind::ChangedSelectedNode => "changed_selected_node",
            EventKind::ProgramTermination => "program_termination",
            EventKind::SetNodeColor => "set_node_color",
            EventKind::SetEdgeLabel => "set_edge_label",
            EventKind::RuleStart => "rule_start",
            EventKind::RuleApplied => "rule_applied",
            EventKind::NewNode => "new_node",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == tag)
    }
}

/// A decoded runtime event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// First message after connecting.
    Init {
        #[serde(default)]
        running: Option<String>,
    },
    ProgramRunning {
        running: String,
    },
    ProgramStopped,
    /// Full node list; (re)initializes the graph.
    Database {
        nodes: Vec<NodeRecord>,
        #[serde(default)]
        count: Option<usize>,
    },
    /// Predicate table.
    Program {
        predicates: Vec<PredicateDescriptor>,
    },
    RuleSet {
        rules: Vec<String>,
    },
    PersistentDerivation {
        node: RuntimeNodeId,
        tuple: Tuple,
    },
    LinearDerivation {
        node: RuntimeNodeId,
        tuple: Tuple,
    },
    TupleSend {
        from: RuntimeNodeId,
        to: RuntimeNodeId,
        tuple: Tuple,
    },
    LinearConsumption {
        node: RuntimeNodeId,
        tuple: Tuple,
    },
    StepStart {
        node: RuntimeNodeId,
    },
    StepDone {
        #[serde(default)]
        node: Option<RuntimeNodeId>,
    },
    /// Reply to `select_node`: local facts and pending work of one node.
    NodeInfo {
        node: RuntimeNodeId,
        #[serde(default)]
        facts: Vec<Tuple>,
        #[serde(default)]
        queue: Vec<QueuedTuple>,
    },
    /// The runtime switched the node it executes next.
    ChangedSelectedNode {
        node: RuntimeNodeId,
    },
    ProgramTermination,
    SetNodeColor {
        node: RuntimeNodeId,
        r: i64,
        g: i64,
        b: i64,
    },
    SetEdgeLabel {
        from: RuntimeNodeId,
        to: RuntimeNodeId,
        label: String,
    },
    RuleStart {
        node: RuntimeNodeId,
        rule: usize,
    },
    RuleApplied {
        node: RuntimeNodeId,
        rule: usize,
    },
    NewNode {
        node: RuntimeNodeId,
        #[serde(rename = "displayId")]
        display_id: DisplayId,
    },
}

impl RuntimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RuntimeEvent::Init { .. } => EventKind::Init,
            RuntimeEvent::ProgramRunning { .. } => EventKind::ProgramRunning,
            RuntimeEvent::ProgramStopped => EventKind::ProgramStopped,
            RuntimeEvent::Database { .. } => EventKind::Database,
            RuntimeEvent::Program { .. } => EventKind::Program,
            RuntimeEvent::RuleSet { .. } => EventKind::RuleSet,
            RuntimeEvent::PersistentDerivation { .. } => EventKind::PersistentDerivation,
            RuntimeEvent::LinearDerivation { .. } => EventKind::LinearDerivation,
            RuntimeEvent::TupleSend { .. } => EventKind::TupleSend,
            RuntimeEvent::LinearConsumption { .. } => EventKind::LinearConsumption,
            RuntimeEvent::StepStart { .. } => EventKind::StepStart,
            RuntimeEvent::StepDone { .. } => EventKind::StepDone,
            RuntimeEvent::NodeInfo { .. } => EventKind::NodeInfo,
            RuntimeEvent::ChangedSelectedNode { .. } => EventKind::ChangedSelectedNode,
            RuntimeEvent::ProgramTermination => EventKind::ProgramTermination,
            RuntimeEvent::SetNodeColor { .. } => EventKind::SetNodeColor,
            RuntimeEvent::SetEdgeLabel { .. } => EventKind::SetEdgeLabel,
            RuntimeEvent::RuleStart { .. } => EventKind::RuleStart,
            RuntimeEvent::RuleApplied { .. } => EventKind::RuleApplied,
            RuntimeEvent::NewNode { .. } => EventKind::NewNode,
        }
    }
}

/// An event together with the runtime version string it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: Option<String>,
    pub event: RuntimeEvent,
}

/// Decode one raw inbound message.
pub fn decode(raw: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(raw)?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidMessage("missing string field `type`".into()))?;
    let kind = EventKind::from_tag(tag).ok_or_else(|| Error::UnknownEvent(tag.to_string()))?;
    let version = value
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);

    let event = serde_json::from_value(value).map_err(|source| Error::MalformedPayload {
        kind: kind.as_str(),
        source,
    })?;
    Ok(Envelope { version, event })
}

/// Requests sent back to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Execute one step.
    Advance,
    /// Execute `steps` steps without stopping.
    Jump { steps: NonZeroU32 },
    /// Acknowledge termination.
    Terminate,
    /// Ask for a `node_info` dump of `node`.
    SelectNode { node: RuntimeNodeId },
    /// Make `node` the next one the runtime executes.
    SetActiveNode { node: RuntimeNodeId },
}

impl PlayerAction {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

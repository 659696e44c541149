//! Protocol dispatcher.
//!
//! A [`Session`] owns every piece of visualizer state for one runtime
//! connection and applies inbound events to it one at a time. Handlers only
//! mutate local state; anything that must go back to the runtime is queued
//! in the outbox for the host to drain.

use std::time::Instant;

use meldvis_geom::Point;
use serde::Serialize;

use crate::config::VisConfig;
use crate::error::{Error, Result};
use crate::graph::{EdgeAttrs, GraphStore};
use crate::ids::{DisplayId, Rgb, RuntimeNodeId};
use crate::layout::{Layout, SpiralLayout};
use crate::playback::{CommandOutcome, PlaybackController, PlaybackStatus, PlayerCommand};
use crate::program::{Program, QueuedTuple, Tuple};
use crate::protocol::{decode, Envelope, NodeRecord, PlayerAction, RuntimeEvent};
use crate::scene::{Scene, SceneBuilder};
use crate::scheduler::{FlightRequest, FlightScheduler, FlightStats, SendOutcome};
use crate::trail::{EventRecord, EventTrail, RecordClass};

/// A fact in a node inspection dump, already rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedFact {
    pub text: String,
    #[serde(rename = "toDelete")]
    pub to_delete: bool,
}

/// Latest `node_info` reply for the selected node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInspection {
    pub node: RuntimeNodeId,
    pub facts: Vec<String>,
    pub queue: Vec<QueuedFact>,
}

/// Summary for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub runtime_version: Option<String>,
    pub program: Option<String>,
    pub playback: PlaybackStatus,
    pub nodes: usize,
    pub edges: usize,
    pub selected: Option<RuntimeNodeId>,
    pub active: Option<RuntimeNodeId>,
    pub flights: FlightStats,
    pub fault: Option<String>,
}

/// All visualizer state for one runtime connection.
pub struct Session {
    graph: GraphStore,
    trail: EventTrail,
    scheduler: FlightScheduler,
    playback: PlaybackController,
    program: Program,
    layout: Box<dyn Layout>,
    scene: SceneBuilder,
    connected: bool,
    runtime_version: Option<String>,
    program_name: Option<String>,
    active_node: Option<RuntimeNodeId>,
    inspection: Option<NodeInspection>,
    outbox: Vec<PlayerAction>,
    fault: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&VisConfig::default())
    }
}

impl Session {
    pub fn new(config: &VisConfig) -> Self {
        Self::with_layout(config, Box::new(SpiralLayout::default()))
    }

    /// Session placing nodes with a custom layout.
    pub fn with_layout(config: &VisConfig, layout: Box<dyn Layout>) -> Self {
        Self {
            graph: GraphStore::new(),
            trail: EventTrail::new(config.log_capacity),
            scheduler: FlightScheduler::new(config.flight_interval, config.flight_steps),
            playback: PlaybackController::new(config.step_pacing),
            program: Program::new(),
            layout,
            scene: SceneBuilder::new(config.canvas, config.ease_rate, config.edge_spacing)
                .with_arc_height(config.arc_height),
            connected: false,
            runtime_version: None,
            program_name: None,
            active_node: None,
            inspection: None,
            outbox: Vec::new(),
            fault: None,
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// The runtime connection came up.
    pub fn on_open(&mut self) {
        self.reset();
        self.connected = true;
        self.playback.on_open();
        self.trail
            .append_global("connected to runtime", RecordClass::Connection);
        tracing::info!("runtime connected");
    }

    /// The runtime connection was lost. Everything returns to the pristine
    /// state; nothing survives into the next connection.
    pub fn on_close(&mut self) {
        self.reset();
        self.connected = false;
        self.playback.on_close();
        tracing::warn!("runtime disconnected, session reset");
    }

    fn reset(&mut self) {
        self.graph.reset();
        self.trail.reset();
        self.scheduler.reset();
        self.program.clear();
        self.layout.clear();
        self.scene.reset();
        self.runtime_version = None;
        self.program_name = None;
        self.active_node = None;
        self.inspection = None;
        self.outbox.clear();
        self.fault = None;
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    /// Decode and apply one raw runtime message.
    ///
    /// An unknown event kind faults the session and leaves its state as it
    /// was; later messages are refused with [`Error::Faulted`] until the
    /// connection is reset. Any other decode failure drops only the message
    /// at hand.
    pub fn on_message(&mut self, raw: &str, now: Instant) -> Result<()> {
        if let Some(reason) = &self.fault {
            return Err(Error::Faulted(reason.clone()));
        }

        match decode(raw) {
            Ok(envelope) => {
                self.apply(envelope, now);
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "session fault");
                self.fault = Some(err.to_string());
                Err(err)
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding runtime message");
                Err(err)
            }
        }
    }

    /// Apply an already-decoded event.
    pub fn apply(&mut self, envelope: Envelope, now: Instant) {
        if let Some(version) = envelope.version {
            self.runtime_version = Some(version);
        }
        tracing::trace!(kind = envelope.event.kind().as_str(), "dispatch");
        self.handle(envelope.event, now);
        self.graph.mark_dirty();
    }

    fn handle(&mut self, event: RuntimeEvent, now: Instant) {
        match event {
            RuntimeEvent::Init { running } => {
                self.playback.on_init(running.is_some());
                let text = match &running {
                    Some(name) => format!("runtime ready, running {name}"),
                    None => "runtime ready".to_string(),
                };
                self.trail.append_global(text, RecordClass::Program);
                self.program_name = running;
            }
            RuntimeEvent::ProgramRunning { running } => {
                self.playback.on_program_running();
                self.trail
                    .append_global(format!("program {running} started"), RecordClass::Program);
                self.program_name = Some(running);
            }
            RuntimeEvent::ProgramStopped => {
                self.playback.on_program_stopped();
                self.trail.append_global("program stopped", RecordClass::Program);
                self.program_name = None;
            }
            RuntimeEvent::Database { nodes, count } => self.load_database(nodes, count),
            RuntimeEvent::Program { predicates } => {
                tracing::debug!(predicates = predicates.len(), "predicate table");
                self.program.set_predicates(predicates);
            }
            RuntimeEvent::RuleSet { rules } => {
                tracing::debug!(rules = rules.len(), "rule table");
                self.program.set_rules(rules);
            }
            RuntimeEvent::PersistentDerivation { node, tuple }
            | RuntimeEvent::LinearDerivation { node, tuple } => self.on_derive(node, &tuple),
            RuntimeEvent::LinearConsumption { node, tuple } => self.on_consume(node, &tuple),
            RuntimeEvent::TupleSend { from, to, tuple } => self.on_send(from, to, &tuple, now),
            RuntimeEvent::StepStart { node } => {
                let who = self.node_label(node);
                self.trail
                    .append_global(format!("step on {who}"), RecordClass::Step);
                self.trail.append_node(node, "step start", RecordClass::Step);
            }
            RuntimeEvent::StepDone { node } => {
                self.trail.ruler_global();
                if let Some(node) = node {
                    self.trail.ruler_node(node);
                }
                self.playback.on_step_done(now);
            }
            RuntimeEvent::NodeInfo { node, facts, queue } => {
                self.on_node_info(node, &facts, &queue)
            }
            RuntimeEvent::ChangedSelectedNode { node } => {
                self.active_node = Some(node);
                let who = self.node_label(node);
                self.trail
                    .append_global(format!("now executing {who}"), RecordClass::Info);
            }
            RuntimeEvent::ProgramTermination => {
                self.playback.on_termination();
                self.trail
                    .append_global("program terminated", RecordClass::Program);
            }
            RuntimeEvent::SetNodeColor { node, r, g, b } => {
                if !self.graph.set_node_color(node, Rgb::from_channels(r, g, b)) {
                    tracing::debug!(%node, "color for unknown node ignored");
                }
            }
            RuntimeEvent::SetEdgeLabel { from, to, label } => {
                if self.graph.set_edge_label(from, to, &label) == 0 {
                    tracing::debug!(%from, %to, "label for missing edge ignored");
                }
            }
            RuntimeEvent::RuleStart { node, rule } => {
                let text = format!("rule {}", self.rule_text(rule));
                self.trail.append_node(node, text, RecordClass::Rule);
            }
            RuntimeEvent::RuleApplied { node, rule } => {
                let text = format!("applied {}", self.rule_text(rule));
                self.trail.append_node(node, text, RecordClass::Rule);
            }
            RuntimeEvent::NewNode { node, display_id } => self.add_node(node, display_id),
        }
    }

    fn load_database(&mut self, nodes: Vec<NodeRecord>, count: Option<usize>) {
        if let Some(count) = count.filter(|c| *c != nodes.len()) {
            tracing::warn!(count, listed = nodes.len(), "database count mismatch");
        }
        self.graph.reset();
        self.trail.clear_nodes();
        self.scheduler.reset();
        self.layout.clear();
        self.scene.reset();
        self.active_node = None;
        self.inspection = None;
        for record in &nodes {
            self.add_node(record.id, record.display_id);
        }
        self.trail.append_global(
            format!("database loaded with {} nodes", nodes.len()),
            RecordClass::Program,
        );
        tracing::info!(nodes = nodes.len(), "database loaded");
    }

    fn add_node(&mut self, id: RuntimeNodeId, display_id: DisplayId) {
        if self.graph.add_node(id, display_id) {
            self.layout.insert(id);
        } else {
            tracing::debug!(%id, %display_id, "node already known");
        }
    }

    /// Edge endpoints drawn for a routing fact owned by `node`.
    fn route(&self, node: RuntimeNodeId, tuple: &Tuple) -> Option<(RuntimeNodeId, RuntimeNodeId)> {
        if !self.program.draws_edge(tuple) {
            return None;
        }
        match tuple.destination() {
            Some(dest) => Some((node, dest)),
            None => {
                tracing::debug!(%node, "routing fact without node destination");
                None
            }
        }
    }

    fn on_derive(&mut self, node: RuntimeNodeId, tuple: &Tuple) {
        let text = self.program.format_tuple(tuple);
        let who = self.node_label(node);
        self.trail
            .append_global(format!("{who} derived {text}"), RecordClass::Derive);
        self.trail
            .append_node(node, format!("derived {text}"), RecordClass::Derive);

        if let Some((source, dest)) = self.route(node, tuple) {
            match self
                .graph
                .add_edge(source, dest, EdgeAttrs::for_fact(tuple.fingerprint()))
            {
                Some(_) => self.layout.connect(source, dest),
                None => tracing::debug!(%source, %dest, "edge to unknown node skipped"),
            }
        }
    }

    fn on_consume(&mut self, node: RuntimeNodeId, tuple: &Tuple) {
        let text = self.program.format_tuple(tuple);
        let who = self.node_label(node);
        self.trail
            .append_global(format!("{who} consumed {text}"), RecordClass::Consume);
        self.trail
            .append_node(node, format!("consumed {text}"), RecordClass::Consume);

        if let Some((source, dest)) = self.route(node, tuple) {
            let removed = self
                .graph
                .find_edge(source, dest, &tuple.fingerprint())
                .and_then(|handle| self.graph.remove_edge(handle));
            if removed.is_none() {
                tracing::debug!(%source, %dest, "consumed routing fact had no edge");
            }
        }
    }

    fn on_send(&mut self, from: RuntimeNodeId, to: RuntimeNodeId, tuple: &Tuple, now: Instant) {
        let text = self.program.format_tuple(tuple);
        let request = FlightRequest {
            from,
            to,
            label: text.clone(),
        };

        match self.scheduler.request(request, now) {
            SendOutcome::SelfLoop => {
                self.trail
                    .append_node(from, format!("sent {text} to itself"), RecordClass::SelfLoop);
                return;
            }
            SendOutcome::Deferred { at } => {
                tracing::trace!(%from, %to, delay = ?at.saturating_duration_since(now), "flight deferred");
            }
            SendOutcome::Fired => {}
        }

        let (src, dst) = (self.node_label(from), self.node_label(to));
        self.trail
            .append_global(format!("{src} sent {text} to {dst}"), RecordClass::Send);
        self.trail
            .append_node(from, format!("sent {text} to {dst}"), RecordClass::Send);
        self.trail
            .append_node(to, format!("received {text} from {src}"), RecordClass::Receive);
    }

    fn on_node_info(&mut self, node: RuntimeNodeId, facts: &[Tuple], queue: &[QueuedTuple]) {
        if self.trail.selected() != Some(node) {
            tracing::debug!(%node, "node_info for a node that is not selected");
            return;
        }
        self.inspection = Some(NodeInspection {
            node,
            facts: facts.iter().map(|t| self.program.format_tuple(t)).collect(),
            queue: queue
                .iter()
                .map(|q| QueuedFact {
                    text: self.program.format_tuple(&q.tuple),
                    to_delete: q.to_delete,
                })
                .collect(),
        });
    }

    fn node_label(&self, id: RuntimeNodeId) -> String {
        match self.graph.node(id) {
            Some(node) => format!("@{}", node.display),
            None => format!("@{id}"),
        }
    }

    fn rule_text(&self, rule: usize) -> String {
        self.program
            .rule(rule)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{rule}"))
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    /// Issue a player command. Accepted commands that need the runtime are
    /// queued in the outbox.
    pub fn command(&mut self, command: PlayerCommand) -> CommandOutcome {
        let outcome = self.playback.request(command);
        if let CommandOutcome::Send(action) = outcome {
            self.outbox.push(action);
        }
        outcome
    }

    /// Select `node` for inspection and ask the runtime for its state.
    /// Unknown nodes are ignored.
    pub fn select_node(&mut self, node: RuntimeNodeId) -> bool {
        if !self.graph.contains_node(node) {
            tracing::debug!(%node, "selection of unknown node ignored");
            return false;
        }
        self.trail.select(Some(node));
        self.inspection = None;
        self.outbox.push(PlayerAction::SelectNode { node });
        true
    }

    /// Ask the runtime to execute `node` next.
    pub fn set_active_node(&mut self, node: RuntimeNodeId) -> bool {
        if !self.graph.contains_node(node) {
            tracing::debug!(%node, "activation of unknown node ignored");
            return false;
        }
        self.outbox.push(PlayerAction::SetActiveNode { node });
        true
    }

    /// Select the node drawn closest to a canvas position.
    pub fn pick(&mut self, screen: Point) -> Option<RuntimeNodeId> {
        let world = self.scene.viewport().screen_to_world(screen);
        let node = self.layout.nearest(world)?;
        self.select_node(node).then_some(node)
    }

    /// Actions waiting to be sent to the runtime, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<PlayerAction> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Redraw
    // ------------------------------------------------------------------

    /// One redraw tick: fire due flights and paced advances, move the
    /// layout, compose the frame, then advance glyphs.
    ///
    /// Returns `None` when the frame would match the previous one: the graph
    /// is clean, no glyph is in flight, and both the layout and the viewport
    /// have settled.
    pub fn tick(&mut self, now: Instant) -> Option<Scene> {
        let fired = self.scheduler.poll(now);
        if fired > 0 {
            tracing::trace!(fired, "deferred flights fired");
        }
        if let Some(action) = self.playback.poll(now) {
            self.outbox.push(action);
        }

        let dirty = self.graph.take_dirty();
        let moving = !self.scheduler.flights().is_empty()
            || !self.layout.is_settled()
            || !self.scene.is_settled();
        if !dirty && !moving {
            return None;
        }

        self.layout.step();
        let scene = self
            .scene
            .build(&self.graph, self.layout.as_ref(), self.scheduler.flights());
        if self.scheduler.advance() > 0 {
            // One more frame without the arrived glyphs.
            self.graph.mark_dirty();
        }
        Some(scene)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn trail(&self) -> &EventTrail {
        &self.trail
    }

    /// Entries logged for the selected node since the last call.
    pub fn take_live_trail(&mut self) -> Vec<EventRecord> {
        self.trail.take_live()
    }

    pub fn scheduler(&self) -> &FlightScheduler {
        &self.scheduler
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn inspection(&self) -> Option<&NodeInspection> {
        self.inspection.as_ref()
    }

    pub fn runtime_version(&self) -> Option<&str> {
        self.runtime_version.as_deref()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.connected,
            runtime_version: self.runtime_version.clone(),
            program: self.program_name.clone(),
            playback: PlaybackStatus::from(&self.playback),
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            selected: self.trail.selected(),
            active: self.active_node,
            flights: self.scheduler.stats(),
            fault: self.fault.clone(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.connected)
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("playback", &self.playback.state())
            .field("fault", &self.fault)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackState;
    use std::num::NonZeroU32;
    use std::time::Duration;

    const PROGRAM: &str = r#"{"type":"program","version":"1.0","predicates":[
        {"name":"edge","isLinear":true,"fieldTypes":["node"],"isRoutingPredicate":true},
        {"name":"value","isLinear":false,"fieldTypes":["int"]},
        {"name":"back","isLinear":true,"fieldTypes":["node"],"isReverseRoutingPredicate":true},
        {"name":"both","isLinear":true,"fieldTypes":["node"],
         "isRoutingPredicate":true,"isReverseRoutingPredicate":true}
    ]}"#;
    const DATABASE: &str = r#"{"type":"database","version":"1.0","count":2,
        "nodes":[{"id":1,"displayId":100},{"id":2,"displayId":200}]}"#;

    fn connected() -> (Session, Instant) {
        let mut session = Session::default();
        let now = Instant::now();
        session.on_open();
        session.on_message(PROGRAM, now).unwrap();
        session.on_message(DATABASE, now).unwrap();
        (session, now)
    }

    fn derive(pred: usize, node: u64, dest: u64) -> String {
        format!(
            r#"{{"type":"linear_derivation","version":"1.0","node":{node},
                "tuple":{{"predicateId":{pred},"fields":[{dest}]}}}}"#
        )
    }

    fn consume(pred: usize, node: u64, dest: u64) -> String {
        format!(
            r#"{{"type":"linear_consumption","version":"1.0","node":{node},
                "tuple":{{"predicateId":{pred},"fields":[{dest}]}}}}"#
        )
    }

    #[test]
    fn routing_fact_draws_and_removes_edge() {
        let (mut session, now) = connected();
        assert_eq!(session.graph().node_count(), 2);
        assert_eq!(
            session.graph().node(RuntimeNodeId(1)).unwrap().display,
            DisplayId(100)
        );

        session.on_message(&derive(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 1);
        let (_, edge) = session.graph().edges().next().unwrap();
        assert_eq!((edge.source, edge.dest), (RuntimeNodeId(1), RuntimeNodeId(2)));

        session.on_message(&consume(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
    }

    #[test]
    fn reverse_routing_facts_draw_nothing() {
        let (mut session, now) = connected();
        session.on_message(&derive(2, 1, 2), now).unwrap();
        session.on_message(&derive(3, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);

        session.on_message(&consume(2, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
        assert_eq!(session.trail().global().next().unwrap().text, "@100 consumed back(@2)");
    }

    #[test]
    fn parallel_routing_facts_remove_independently() {
        let (mut session, now) = connected();
        session.on_message(&derive(0, 1, 2), now).unwrap();
        session.on_message(&derive(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 2);
        session.on_message(&consume(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 1);
        session.on_message(&consume(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
    }

    #[test]
    fn non_routing_fact_only_logs() {
        let (mut session, now) = connected();
        session.on_message(&derive(1, 1, 7), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
        let latest = session.trail().global().next().unwrap();
        assert_eq!(latest.text, "@100 derived value(7)");
        assert_eq!(latest.class, RecordClass::Derive);
    }

    #[test]
    fn edge_to_unknown_node_is_skipped() {
        let (mut session, now) = connected();
        session.on_message(&derive(0, 1, 9), now).unwrap();
        assert_eq!(session.graph().edge_count(), 0);
    }

    #[test]
    fn unknown_event_faults_without_mutation() {
        let (mut session, now) = connected();
        let err = session
            .on_message(r#"{"type":"warp_drive","version":"1.0"}"#, now)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEvent(_)));
        assert!(session.is_faulted());
        assert_eq!(session.graph().node_count(), 2);

        let err = session.on_message(&derive(0, 1, 2), now).unwrap_err();
        assert!(matches!(err, Error::Faulted(_)));
        assert_eq!(session.graph().edge_count(), 0);
    }

    #[test]
    fn malformed_payload_is_discarded() {
        let (mut session, now) = connected();
        let before = session.trail().global_len();
        let err = session
            .on_message(r#"{"type":"linear_derivation","node":1}"#, now)
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(!session.is_faulted());
        assert_eq!(session.trail().global_len(), before);

        session.on_message(&derive(0, 1, 2), now).unwrap();
        assert_eq!(session.graph().edge_count(), 1);
    }

    #[test]
    fn reconnect_resets_everything() {
        let (mut session, now) = connected();
        session.on_message(&derive(0, 1, 2), now).unwrap();
        session
            .on_message(r#"{"type":"mystery","version":"1.0"}"#, now)
            .unwrap_err();
        session.on_close();

        assert_eq!(session.graph().node_count(), 0);
        assert_eq!(session.graph().edge_count(), 0);
        assert_eq!(session.trail().global_len(), 0);
        assert_eq!(session.playback().state(), PlaybackState::Disconnected);
        assert!(!session.is_faulted());
        assert_eq!(session.runtime_version(), None);

        session.on_open();
        assert_eq!(session.playback().state(), PlaybackState::AwaitingProgram);
        assert!(session.on_message(DATABASE, now).is_ok());
    }

    #[test]
    fn database_resets_previous_graph() {
        let (mut session, now) = connected();
        session.on_message(&derive(0, 1, 2), now).unwrap();
        session
            .on_message(r#"{"type":"database","nodes":[{"id":5,"displayId":50}]}"#, now)
            .unwrap();
        assert_eq!(session.graph().node_count(), 1);
        assert_eq!(session.graph().edge_count(), 0);
        assert!(session.graph().contains_node(RuntimeNodeId(5)));
    }

    #[test]
    fn database_keeps_global_log_and_drops_active_node() {
        let (mut session, now) = connected();
        session
            .on_message(r#"{"type":"changed_selected_node","node":1}"#, now)
            .unwrap();
        session.on_message(&derive(1, 1, 7), now).unwrap();
        assert_eq!(session.status().active, Some(RuntimeNodeId(1)));

        session
            .on_message(r#"{"type":"database","nodes":[{"id":5,"displayId":50}]}"#, now)
            .unwrap();
        assert_eq!(session.status().active, None);
        assert_eq!(session.trail().node_len(RuntimeNodeId(1)), 0);
        let texts: Vec<&str> = session.trail().global().map(|r| r.text.as_str()).collect();
        assert_eq!(texts.first(), Some(&"database loaded with 1 nodes"));
        assert!(texts.contains(&"connected to runtime"));
        assert!(texts.contains(&"@100 derived value(7)"));
    }

    #[test]
    fn late_node_joins_graph() {
        let (mut session, now) = connected();
        session
            .on_message(r#"{"type":"new_node","node":3,"displayId":300}"#, now)
            .unwrap();
        session
            .on_message(r#"{"type":"new_node","node":3,"displayId":301}"#, now)
            .unwrap();
        assert_eq!(session.graph().node_count(), 3);
        assert_eq!(
            session.graph().node(RuntimeNodeId(3)).unwrap().display,
            DisplayId(301)
        );
    }

    #[test]
    fn sends_are_debounced_per_pair() {
        let (mut session, now) = connected();
        let send = r#"{"type":"tuple_send","from":1,"to":2,"tuple":{"predicateId":1,"fields":[4]}}"#;
        session.on_message(send, now).unwrap();
        session.on_message(send, now + Duration::from_millis(10)).unwrap();
        assert_eq!(session.scheduler().flights().len(), 1);
        assert_eq!(session.scheduler().pending(), 1);

        session.tick(now + Duration::from_millis(200));
        assert_eq!(session.scheduler().stats().fired, 2);
    }

    #[test]
    fn self_send_is_annotated_not_animated() {
        let (mut session, now) = connected();
        let send = r#"{"type":"tuple_send","from":1,"to":1,"tuple":{"predicateId":1,"fields":[4]}}"#;
        session.on_message(send, now).unwrap();
        assert!(session.scheduler().flights().is_empty());
        session.select_node(RuntimeNodeId(1));
        let log = session.trail().render_selected(RuntimeNodeId(1));
        assert_eq!(log[0].class, RecordClass::SelfLoop);
    }

    #[test]
    fn player_flow_through_session() {
        let (mut session, now) = connected();
        session
            .on_message(r#"{"type":"init","running":"ring.meld"}"#, now)
            .unwrap();
        assert_eq!(session.playback().state(), PlaybackState::Running);
        session.on_message(r#"{"type":"step_done","node":1}"#, now).unwrap();
        assert_eq!(session.playback().state(), PlaybackState::StepReady);

        let steps = NonZeroU32::new(3).unwrap();
        assert_eq!(
            session.command(PlayerCommand::Jump { steps }),
            CommandOutcome::Send(PlayerAction::Jump { steps })
        );
        assert_eq!(session.drain_outbox(), vec![PlayerAction::Jump { steps }]);

        session.on_message(r#"{"type":"program_termination"}"#, now).unwrap();
        assert_eq!(session.command(PlayerCommand::Advance), CommandOutcome::Rejected);
        assert!(session.drain_outbox().is_empty());
    }

    #[test]
    fn continuous_play_advances_from_tick() {
        let (mut session, now) = connected();
        session.on_message(r#"{"type":"init","running":"p"}"#, now).unwrap();
        session.command(PlayerCommand::Play);
        session.on_message(r#"{"type":"step_done"}"#, now).unwrap();
        session.tick(now);
        assert!(session.drain_outbox().is_empty());
        session.tick(now + Duration::from_millis(250));
        assert_eq!(session.drain_outbox(), vec![PlayerAction::Advance]);
    }

    #[test]
    fn selection_requests_node_info() {
        let (mut session, now) = connected();
        assert!(!session.select_node(RuntimeNodeId(42)));
        assert!(session.select_node(RuntimeNodeId(2)));
        assert_eq!(
            session.drain_outbox(),
            vec![PlayerAction::SelectNode { node: RuntimeNodeId(2) }]
        );

        session
            .on_message(
                r#"{"type":"node_info","node":2,
                    "facts":[{"predicateId":1,"fields":[5]}],
                    "queue":[{"tuple":{"predicateId":0,"fields":[1]},"toDelete":true}]}"#,
                now,
            )
            .unwrap();
        let info = session.inspection().unwrap();
        assert_eq!(info.facts, vec!["value(5)"]);
        assert_eq!(info.queue[0].text, "edge(@1)");
        assert!(info.queue[0].to_delete);
    }

    #[test]
    fn stale_node_info_is_ignored() {
        let (mut session, now) = connected();
        session
            .on_message(r#"{"type":"node_info","node":1,"facts":[]}"#, now)
            .unwrap();
        assert!(session.inspection().is_none());
    }

    #[test]
    fn active_node_request() {
        let (mut session, _) = connected();
        assert!(session.set_active_node(RuntimeNodeId(1)));
        assert_eq!(
            session.drain_outbox(),
            vec![PlayerAction::SetActiveNode { node: RuntimeNodeId(1) }]
        );
    }

    #[test]
    fn version_is_tracked() {
        let (session, _) = connected();
        assert_eq!(session.runtime_version(), Some("1.0"));
        assert_eq!(session.status().nodes, 2);
    }

    #[test]
    fn tick_produces_scene() {
        let (mut session, now) = connected();
        let scene = session.tick(now).unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert!(!session.graph.take_dirty());
    }

    #[test]
    fn idle_ticks_skip_frames_until_something_changes() {
        let (mut session, now) = connected();
        let mut frames = 0;
        while session.tick(now).is_some() {
            frames += 1;
            assert!(frames < 1_000, "scene never settled");
        }
        assert!(session.tick(now).is_none());

        session
            .on_message(r#"{"type":"set_node_color","node":2,"r":0,"g":0,"b":255}"#, now)
            .unwrap();
        let scene = session.tick(now).unwrap();
        let node = scene.nodes.iter().find(|n| n.id == RuntimeNodeId(2)).unwrap();
        assert_eq!(node.color, Rgb::new(0, 0, 255).to_hex());
    }

    #[test]
    fn arrived_glyph_gets_a_final_frame() {
        let config = VisConfig {
            flight_steps: 2,
            ..VisConfig::default()
        };
        let mut session = Session::new(&config);
        let now = Instant::now();
        session.on_open();
        session.on_message(PROGRAM, now).unwrap();
        session.on_message(DATABASE, now).unwrap();
        while session.tick(now).is_some() {}

        let send = r#"{"type":"tuple_send","from":1,"to":2,"tuple":{"predicateId":1,"fields":[4]}}"#;
        session.on_message(send, now).unwrap();
        assert_eq!(session.tick(now).unwrap().glyphs.len(), 1);
        assert_eq!(session.tick(now).unwrap().glyphs.len(), 1);
        assert!(session.tick(now).unwrap().glyphs.is_empty());
        assert!(session.tick(now).is_none());
    }

    #[test]
    fn node_color_applies() {
        let (mut session, now) = connected();
        session
            .on_message(r#"{"type":"set_node_color","node":1,"r":255,"g":0,"b":0}"#, now)
            .unwrap();
        assert_eq!(session.graph().node(RuntimeNodeId(1)).unwrap().color, Rgb::new(255, 0, 0));
    }
}

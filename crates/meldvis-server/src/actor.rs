//! Session actor: the single owner of the visualizer [`Session`].
//!
//! Everything that touches the session goes through one mpsc channel, so
//! inbound runtime events, user commands, queries and redraw ticks are
//! processed strictly one at a time without locks.
//!
//! ```text
//!   SessionHandle (Clone)        mpsc        SessionActor (one task)
//!   ┌──────────────────────┐  ─────────▶  ┌───────────────────────────┐
//!   │ .inbound() .command()│              │ Session                   │
//!   │ .status() .scene()   │  ◀─────────  │ redraw interval           │
//!   └──────────────────────┘   oneshot    │ outbox → runtime client   │
//!                                         └───────────────────────────┘
//!                        broadcast Frame per tick ──▶ WebSocket clients
//! ```

use std::time::{Duration, Instant};

use meldvis_core::{
    CommandOutcome, EventRecord, NodeInspection, PlaybackStatus, PlayerAction, PlayerCommand,
    Point, RuntimeNodeId, Scene, Session, SessionStatus, VisConfig,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::error::{Result, ServerError};

/// Frames buffered per WebSocket subscriber before it starts lagging.
const FRAME_BUFFER: usize = 16;

/// What the session wants the runtime connection to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send this action to the runtime.
    Action(PlayerAction),
    /// Drop the connection so the session starts over.
    Reset,
}

/// One redraw tick as pushed to presentation clients.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub scene: Scene,
    pub playback: PlaybackStatus,
    /// Entries logged for the selected node during this tick.
    pub live_trail: Vec<EventRecord>,
}

/// Result of a player command issued through the host.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub accepted: bool,
    pub playback: PlaybackStatus,
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum SessionCommand {
    // Runtime connection
    Opened,
    Closed,
    Inbound(String),

    // User
    Player {
        command: PlayerCommand,
        reply: oneshot::Sender<CommandReply>,
    },
    Select {
        node: RuntimeNodeId,
        reply: oneshot::Sender<bool>,
    },
    Activate {
        node: RuntimeNodeId,
        reply: oneshot::Sender<bool>,
    },
    Pick {
        at: Point,
        reply: oneshot::Sender<Option<RuntimeNodeId>>,
    },

    // Queries
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Scene {
        reply: oneshot::Sender<Scene>,
    },
    Playback {
        reply: oneshot::Sender<PlaybackStatus>,
    },
    Trail {
        node: Option<RuntimeNodeId>,
        reply: oneshot::Sender<Vec<EventRecord>>,
    },
    Inspection {
        reply: oneshot::Sender<Option<NodeInspection>>,
    },
}

// ============================================================================
// SessionHandle (public API)
// ============================================================================

/// Cloneable handle to the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    frames: broadcast::Sender<Frame>,
}

impl SessionHandle {
    fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| ServerError::Shutdown)
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| ServerError::Shutdown)
    }

    // ── Runtime connection ───────────────────────────────────────────────

    pub fn opened(&self) -> Result<()> {
        self.send(SessionCommand::Opened)
    }

    pub fn closed(&self) -> Result<()> {
        self.send(SessionCommand::Closed)
    }

    /// Hand one raw runtime message to the session.
    pub fn inbound(&self, raw: String) -> Result<()> {
        self.send(SessionCommand::Inbound(raw))
    }

    // ── User ─────────────────────────────────────────────────────────────

    pub async fn command(&self, command: PlayerCommand) -> Result<CommandReply> {
        self.ask(|reply| SessionCommand::Player { command, reply }).await
    }

    pub async fn select(&self, node: RuntimeNodeId) -> Result<bool> {
        self.ask(|reply| SessionCommand::Select { node, reply }).await
    }

    pub async fn activate(&self, node: RuntimeNodeId) -> Result<bool> {
        self.ask(|reply| SessionCommand::Activate { node, reply }).await
    }

    /// Select the node drawn nearest a canvas position.
    pub async fn pick(&self, at: Point) -> Result<Option<RuntimeNodeId>> {
        self.ask(|reply| SessionCommand::Pick { at, reply }).await
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<SessionStatus> {
        self.ask(|reply| SessionCommand::Status { reply }).await
    }

    /// Most recent frame's scene.
    pub async fn scene(&self) -> Result<Scene> {
        self.ask(|reply| SessionCommand::Scene { reply }).await
    }

    pub async fn playback(&self) -> Result<PlaybackStatus> {
        self.ask(|reply| SessionCommand::Playback { reply }).await
    }

    /// Global log, or one node's log, newest first.
    pub async fn trail(&self, node: Option<RuntimeNodeId>) -> Result<Vec<EventRecord>> {
        self.ask(|reply| SessionCommand::Trail { node, reply }).await
    }

    pub async fn inspection(&self) -> Result<Option<NodeInspection>> {
        self.ask(|reply| SessionCommand::Inspection { reply }).await
    }

    /// Receive every frame from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.frames.subscribe()
    }
}

// ============================================================================
// SessionActor
// ============================================================================

/// Owns the [`Session`] and drives its redraw tick.
pub struct SessionActor {
    session: Session,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
    outbound: mpsc::UnboundedSender<Outbound>,
    frames: broadcast::Sender<Frame>,
    latest: Scene,
    last_playback: PlaybackStatus,
    period: Duration,
}

impl SessionActor {
    /// Spawn the actor on the current runtime.
    ///
    /// Returns the handle and the receiver the runtime client reads
    /// outbound traffic from.
    pub fn spawn(config: &VisConfig) -> (SessionHandle, mpsc::UnboundedReceiver<Outbound>) {
        let (handle, actor, outbound) = Self::new(config);
        tokio::spawn(actor.run());
        (handle, outbound)
    }

    fn new(config: &VisConfig) -> (SessionHandle, Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (frames, _) = broadcast::channel(FRAME_BUFFER);
        let handle = SessionHandle {
            tx,
            frames: frames.clone(),
        };
        let session = Session::new(config);
        let last_playback = PlaybackStatus::from(session.playback());
        let actor = Self {
            session,
            rx,
            outbound: out_tx,
            frames,
            latest: Scene::empty(config.canvas),
            last_playback,
            period: config.tick,
        };
        (handle, actor, out_rx)
    }

    /// Process commands and ticks until every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period = ?self.period, "session actor started");

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = ticker.tick() => self.tick(Instant::now()),
            }
            self.flush_outbox();
        }
        tracing::debug!("session actor stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Opened => self.session.on_open(),
            SessionCommand::Closed => self.session.on_close(),
            SessionCommand::Inbound(raw) => {
                if let Err(err) = self.session.on_message(&raw, Instant::now()) {
                    if matches!(err, meldvis_core::Error::UnknownEvent(_)) {
                        tracing::error!(error = %err, "runtime protocol out of sync, resetting connection");
                        let _ = self.outbound.send(Outbound::Reset);
                    }
                }
            }
            SessionCommand::Player { command, reply } => {
                let outcome = self.session.command(command);
                let _ = reply.send(CommandReply {
                    accepted: outcome != CommandOutcome::Rejected,
                    playback: PlaybackStatus::from(self.session.playback()),
                });
            }
            SessionCommand::Select { node, reply } => {
                let _ = reply.send(self.session.select_node(node));
            }
            SessionCommand::Activate { node, reply } => {
                let _ = reply.send(self.session.set_active_node(node));
            }
            SessionCommand::Pick { at, reply } => {
                let _ = reply.send(self.session.pick(at));
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.session.status());
            }
            SessionCommand::Scene { reply } => {
                let _ = reply.send(self.latest.clone());
            }
            SessionCommand::Playback { reply } => {
                let _ = reply.send(PlaybackStatus::from(self.session.playback()));
            }
            SessionCommand::Trail { node, reply } => {
                let trail = self.session.trail();
                let records = match node {
                    Some(node) => trail.render_selected(node).into_iter().cloned().collect(),
                    None => trail.global().cloned().collect(),
                };
                let _ = reply.send(records);
            }
            SessionCommand::Inspection { reply } => {
                let _ = reply.send(self.session.inspection().cloned());
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        let scene = self.session.tick(now);
        let playback = PlaybackStatus::from(self.session.playback());
        let live_trail = self.session.take_live_trail();

        let scene = match scene {
            Some(scene) => {
                self.latest = scene.clone();
                scene
            }
            None if live_trail.is_empty() && playback == self.last_playback => return,
            None => self.latest.clone(),
        };
        self.last_playback = playback.clone();
        let frame = Frame {
            scene,
            playback,
            live_trail,
        };
        // No subscribers is fine.
        let _ = self.frames.send(frame);
    }

    fn flush_outbox(&mut self) {
        for action in self.session.drain_outbox() {
            tracing::debug!(?action, "player action");
            if self.outbound.send(Outbound::Action(action)).is_err() {
                tracing::warn!("runtime client gone, dropping player action");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meldvis_core::PlaybackState;

    const DATABASE: &str =
        r#"{"type":"database","nodes":[{"id":1,"displayId":10},{"id":2,"displayId":20}]}"#;

    #[tokio::test]
    async fn status_reflects_inbound_events() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        handle.inbound(DATABASE.to_string()).unwrap();

        let status = handle.status().await.unwrap();
        assert!(status.connected);
        assert_eq!(status.nodes, 2);
        assert_eq!(status.playback.state, PlaybackState::AwaitingProgram);
    }

    #[tokio::test]
    async fn selection_goes_to_runtime() {
        let (handle, mut outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        handle.inbound(DATABASE.to_string()).unwrap();

        assert!(handle.select(RuntimeNodeId(2)).await.unwrap());
        assert_eq!(
            outbound.recv().await,
            Some(Outbound::Action(PlayerAction::SelectNode { node: RuntimeNodeId(2) }))
        );
    }

    #[tokio::test]
    async fn rejected_command_is_not_sent() {
        let (handle, mut outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        let reply = handle.command(PlayerCommand::Advance).await.unwrap();
        assert!(!reply.accepted);
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_event_requests_reset() {
        let (handle, mut outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        handle.inbound(r#"{"type":"cosmic_ray"}"#.to_string()).unwrap();
        assert_eq!(outbound.recv().await, Some(Outbound::Reset));
        assert!(handle.status().await.unwrap().fault.is_some());

        handle.closed().unwrap();
        assert!(handle.status().await.unwrap().fault.is_none());
    }

    #[tokio::test]
    async fn frames_are_broadcast() {
        let config = VisConfig {
            tick: Duration::from_millis(5),
            ..VisConfig::default()
        };
        let (handle, _outbound) = SessionActor::spawn(&config);
        let mut frames = handle.subscribe();
        handle.opened().unwrap();
        handle.inbound(DATABASE.to_string()).unwrap();

        let mut nodes = 0;
        for _ in 0..20 {
            let frame = frames.recv().await.unwrap();
            nodes = frame.scene.nodes.len();
            if nodes == 2 {
                break;
            }
        }
        assert_eq!(nodes, 2);
    }

    #[tokio::test]
    async fn idle_session_stops_broadcasting() {
        let (handle, mut actor, _outbound) = SessionActor::new(&VisConfig::default());
        let mut frames = handle.subscribe();
        let now = Instant::now();
        actor.session.on_open();
        actor.session.on_message(DATABASE, now).unwrap();

        let mut sent = 0;
        loop {
            actor.tick(now);
            match frames.try_recv() {
                Ok(_) => sent += 1,
                Err(_) => break,
            }
            assert!(sent < 1_000, "frames never stopped");
        }
        assert!(sent > 0);
        assert_eq!(actor.latest.nodes.len(), 2);

        actor.session.on_message(r#"{"type":"init","running":"p"}"#, now).unwrap();
        actor.tick(now);
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.playback.state, PlaybackState::Running);
    }

    #[tokio::test]
    async fn trail_queries() {
        let (handle, _outbound) = SessionActor::spawn(&VisConfig::default());
        handle.opened().unwrap();
        handle.inbound(DATABASE.to_string()).unwrap();
        let global = handle.trail(None).await.unwrap();
        assert_eq!(global[0].text, "database loaded with 2 nodes");
        assert!(handle.trail(Some(RuntimeNodeId(1))).await.unwrap().is_empty());
    }

    #[test]
    fn handle_errors_after_shutdown() {
        let (handle, actor, _outbound) = SessionActor::new(&VisConfig::default());
        drop(actor);
        assert!(matches!(handle.opened(), Err(ServerError::Shutdown)));
        let status = tokio_test::block_on(handle.status());
        assert!(matches!(status, Err(ServerError::Shutdown)));
    }
}

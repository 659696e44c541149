//! Meldvis Core
//!
//! State synchronizer behind the meldvis execution visualizer. Consumes the
//! event stream of a running Meld program and keeps a renderable model of
//! it: runtime nodes, routing edges, per-node event logs, in-flight message
//! glyphs, and the player state machine.
//!
//! # Architecture
//!
//! - **Graph**: visual nodes and routing edges keyed by runtime ids
//! - **Trail**: bounded global log and unbounded per-node logs
//! - **Scheduler**: per-pair flight debounce and glyph animation
//! - **Protocol**: tagged runtime events and outbound player actions
//! - **Session**: dispatcher that owns all of the above for one connection
//! - **Playback**: which player actions are valid right now
//! - **Scene**: screen-space snapshot built on every redraw tick
//!
//! # Usage
//!
//! ```ignore
//! let mut session = Session::new(&VisConfig::from_env()?);
//! session.on_open();
//! session.on_message(raw, Instant::now())?;
//! if let Some(scene) = session.tick(Instant::now()) {
//!     publish(scene);
//! }
//! for action in session.drain_outbox() {
//!     socket.send(action.to_json()?).await?;
//! }
//! ```

mod config;
mod error;
mod graph;
mod ids;
mod layout;
mod playback;
mod program;
mod protocol;
mod scene;
mod scheduler;
mod session;
mod trail;

pub use config::{
    VisConfig, DEFAULT_LISTEN_ADDR, DEFAULT_RECONNECT_INTERVAL, DEFAULT_RUNTIME_URL, DEFAULT_TICK,
};
pub use error::{Error, Result};
pub use graph::{EdgeAttrs, EdgeHandle, GraphStore, VisualEdge, VisualNode, NODE_HEIGHT};
pub use ids::{DisplayId, Rgb, RuntimeNodeId};
pub use layout::{spiral_slot, Layout, SpiralLayout};
pub use playback::{CommandOutcome, PlaybackController, PlaybackState, PlaybackStatus, PlayerCommand};
pub use program::{FieldType, FieldValue, PredicateDescriptor, Program, QueuedTuple, Tuple};
pub use protocol::{decode, Envelope, EventKind, NodeRecord, PlayerAction, RuntimeEvent};
pub use scene::{Scene, SceneBuilder, SceneEdge, SceneGlyph, SceneNode};
pub use scheduler::{Flight, FlightRequest, FlightScheduler, FlightStats, SendOutcome};
pub use session::{NodeInspection, QueuedFact, Session, SessionStatus};
pub use trail::{EventRecord, EventTrail, RecordClass};

pub use meldvis_geom::{CanvasSize, Point};

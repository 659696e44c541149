//! Meldvis host process.
//!
//! Connects a [`meldvis_core::Session`] to a running Meld runtime and serves
//! the result to presentation clients.
//!
//! # Architecture
//!
//! - **Actor**: one task owns the session; everything else holds a
//!   [`SessionHandle`]
//! - **Client**: WebSocket link to the runtime with fixed-interval reconnect
//! - **Server**: REST API for status, playback and selection, plus a
//!   WebSocket that streams one frame per redraw tick
//!
//! # Usage
//!
//! ```ignore
//! let config = VisConfig::from_env()?;
//! let (session, outbound) = SessionActor::spawn(&config);
//! tokio::spawn(RuntimeClient::new(&config.runtime_url, config.reconnect_interval, session.clone(), outbound).run());
//! VisServer::new(session).serve(config.listen_addr).await?;
//! ```

mod actor;
mod client;
mod error;
mod server;

pub use actor::{CommandReply, Frame, Outbound, SessionActor, SessionHandle};
pub use client::RuntimeClient;
pub use error::{Result, ServerError};
pub use server::VisServer;

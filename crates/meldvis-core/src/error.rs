//! Error types for meldvis-core.

use thiserror::Error;

/// Result type for meldvis-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or applying runtime events.
#[derive(Debug, Error)]
pub enum Error {
    /// The runtime sent an event kind this visualizer does not know.
    ///
    /// Fatal to the session: nothing downstream can be trusted to be in sync.
    #[error("unrecognized event type: {0}")]
    UnknownEvent(String),

    /// A known event kind whose payload is missing or mistyped fields.
    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The message was not a JSON object with a string `type` tag.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The message was not valid JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The session is faulted and refuses further events until reset.
    #[error("session faulted: {0}")]
    Faulted(String),
}

impl Error {
    /// Whether this error poisons the session (as opposed to dropping one
    /// event).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UnknownEvent(_) | Error::Faulted(_))
    }
}

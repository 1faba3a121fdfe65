//! Wire-level error types

use thiserror::Error;

/// Errors that can occur while talking to the simulator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Connect refused, endpoint unreachable, or the stream failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected the command; carries the raw reply
    #[error("{0}")]
    Command(String),

    /// Operation attempted after `close`
    #[error("Not connected")]
    NotConnected,

    /// A query reply that does not match the expected grammar
    #[error("Malformed reply to {command}: {reply:?}")]
    MalformedReply { command: String, reply: String },

    /// A command argument that would break line framing
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),

    /// The local deadline elapsed before the reply arrived
    #[error("Timed out waiting for reply")]
    Timeout,

    /// The caller cancelled the exchange
    #[error("Exchange cancelled")]
    Cancelled,

    /// A previous exchange was abandoned; its reply may still be in flight
    #[error("Stream desynchronized by an abandoned exchange; reconnect required")]
    Desynchronized,

    /// The command was acknowledged, but the automatic repaint after it failed
    #[error("Command applied but repaint failed: {0}")]
    RepaintFailed(Box<WireError>),
}

impl WireError {
    /// Whether the server applied the command despite the error
    pub fn command_applied(&self) -> bool {
        matches!(self, WireError::RepaintFailed(_))
    }
}

impl From<std::io::Error> for WireError {
    fn from(e: std::io::Error) -> Self {
        WireError::Connection(e.to_string())
    }
}

/// Result type alias for wire operations
pub type WireResult<T> = Result<T, WireError>;

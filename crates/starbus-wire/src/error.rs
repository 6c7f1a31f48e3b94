//! Error types for the wire codec.

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Error type for codec operations.
///
/// Any grammar violation is terminal for the stream that produced it: the
/// decoder enters an absorbing error state and the caller tears the
/// connection down. There is no recovery mid-stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// A character violated the current tokenizer state's grammar.
    #[error("syntax error at offset {offset}: unexpected {found:?}")]
    Syntax { offset: u64, found: char },

    /// A `}` or `]` closed a container that was never opened, or closed
    /// the wrong container kind.
    #[error("unbalanced close at offset {offset}")]
    Unbalanced { offset: u64 },

    /// A number literal failed to parse.
    #[error("invalid number literal '{0}'")]
    BadNumber(String),

    /// A bare word other than `true`/`false`.
    #[error("invalid literal '{0}'")]
    BadLiteral(String),

    /// A token arrived where the message grammar does not allow it.
    #[error("grammar error: {0}")]
    Grammar(&'static str),

    /// The stream already failed; no further input is accepted.
    #[error("decoder is in the error state")]
    Poisoned,

    /// Malformed WebSocket frame or handshake.
    #[error("websocket framing error: {0}")]
    Frame(String),

    /// Transport IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

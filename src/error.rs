//! Error types for the session engine.
//!
//! Protocol-level failures (error numerics, nickname collisions) are not
//! errors here: they are surfaced as [`crate::engine::Event`]s. These types
//! cover the cases where an operation could not be carried out at all.

use thiserror::Error;

/// Failure to turn a raw line into a [`crate::irc::Message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("line has a prefix but no command")]
    MissingCommand,
    #[error("invalid command token {0:?}")]
    InvalidCommand(String),
}

/// Failure reported by the byte-stream transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("write failed: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already connecting or online")]
    AlreadyActive,
    #[error("session is not online")]
    NotOnline,
    #[error("out of memory while queueing a message")]
    OutOfMemory,
    #[error("CTCP DCC requests cannot be sent as user commands")]
    DccNotAllowed,
    #[error("invalid DCC request: {0}")]
    InvalidDcc(String),
    #[error("no DCC session for port {port} id {id}")]
    UnknownDcc { port: u16, id: u32 },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

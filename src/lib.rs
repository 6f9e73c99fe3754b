//! Sans-IO IRC session engine.
//!
//! The [`engine::Session`] turns bytes from a server into [`engine::Event`]s,
//! paces what it sends with a flood-control budget and matches numeric
//! replies to the command that caused them. I/O, timers and the wall clock
//! belong to the owner; [`transport::TcpTransport`] is the tokio transport
//! the bundled binary uses.

pub mod config;
pub mod engine;
pub mod error;
pub mod irc;
pub mod logging;
pub mod transport;

pub use engine::{Event, Session};
pub use error::{Result, SessionError};

//! IRC protocol layer: wire messages, CTCP payloads, numerics and server capabilities.

pub mod commands;
pub mod ctcp;
pub mod format;
pub mod message;
pub mod reply;
pub mod support;

pub use ctcp::CtcpInfo;
pub use message::Message;
pub use support::ServerSupport;

//! Byte-stream transport seam.
//!
//! The session only ever writes through [`Transport`]; reads, readiness and
//! closure come back to it through the owner calling
//! [`Session::on_data`](crate::engine::Session::on_data) and friends.

pub mod tcp;

use crate::error::TransportError;
use std::time::Duration;

pub use tcp::{TcpTransport, TransportEvent};

/// Where to connect. `service` names the protocol for resolvers that want
/// one; the port always wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub service: &'static str,
    pub port: u16,
    pub tls: bool,
    /// Close the connection after this long without receiving anything.
    pub idle_timeout: Duration,
    pub accept_invalid_certs: bool,
}

pub trait Transport {
    /// Start connecting. Completion is reported asynchronously.
    fn connect(&mut self, target: &ConnectTarget) -> Result<(), TransportError>;

    /// Queue one already CRLF-terminated line.
    fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;

    fn close(&mut self);
}

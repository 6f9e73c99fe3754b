//! The sans-IO session engine: connection state, send pacing and reply
//! correlation. Nothing in here performs I/O or reads a clock.

pub mod dcc;
pub mod event;
pub mod handler;
pub mod handlers;
pub mod presence;
pub mod router;
pub mod scheduler;
pub mod session;

pub use dcc::{DccReceive, DccSend, DccSessions, LocalAddress};
pub use event::{ChatTarget, Event, WhoisInfo};
pub use handler::{Handler, HandlerContext, HandlerKind, MessageHandler, Progress, ReplyHandler};
pub use presence::{Contact, Contacts};
pub use router::Router;
pub use scheduler::{FloodScheduler, Outgoing, Priority};
pub use session::{ConnectParams, Core, Host, Session, SessionState, SystemHost};

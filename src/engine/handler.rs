//! Handler lifecycle.
//!
//! A [`Handler`] is attached to one outgoing message and consumes the replies
//! (numerics) or messages (named commands) that belong to it. It lives in the
//! scheduler's queue until its first wire line goes out, then in the router's
//! active list until it reports completion or its timeout expires.

use crate::engine::session::Core;
use crate::irc::Message;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Reacts to numeric replies.
pub trait ReplyHandler {
    fn name(&self) -> &'static str;

    /// Returns `true` when the reply was consumed and must not be offered to
    /// later handlers or the generic fallback.
    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool;

    /// Called once when the deadline passes before completion.
    fn handle_timeout(&mut self, _ctx: &mut HandlerContext<'_>) {}
}

/// Reacts to named commands (PRIVMSG, NOTICE, ...).
pub trait MessageHandler {
    fn name(&self) -> &'static str;

    fn handle_message(&mut self, ctx: &mut HandlerContext<'_>, message: &Message, command: &str)
        -> bool;

    fn handle_timeout(&mut self, _ctx: &mut HandlerContext<'_>) {}
}

pub enum HandlerKind {
    Reply(Box<dyn ReplyHandler>),
    Message(Box<dyn MessageHandler>),
}

/// Completion bookkeeping shared by both handler kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    done: bool,
    pending_lines: usize,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            done: false,
            pending_lines: 1,
            timeout: None,
            deadline: None,
        }
    }
}

impl Progress {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn pending_lines(&self) -> usize {
        self.pending_lines
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// One wire line of the originating send has been fully answered.
    /// Returns whether the handler is now done.
    pub fn complete_line(&mut self) -> bool {
        self.pending_lines = self.pending_lines.saturating_sub(1);
        if self.pending_lines == 0 {
            self.done = true;
        }
        self.done
    }
}

pub struct Handler {
    kind: HandlerKind,
    progress: Progress,
}

impl Handler {
    pub fn reply(handler: impl ReplyHandler + 'static) -> Self {
        Self {
            kind: HandlerKind::Reply(Box::new(handler)),
            progress: Progress::default(),
        }
    }

    pub fn message(handler: impl MessageHandler + 'static) -> Self {
        Self {
            kind: HandlerKind::Message(Box::new(handler)),
            progress: Progress::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.progress.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            HandlerKind::Reply(h) => h.name(),
            HandlerKind::Message(h) => h.name(),
        }
    }

    pub fn is_reply_handler(&self) -> bool {
        matches!(self.kind, HandlerKind::Reply(_))
    }

    pub fn is_done(&self) -> bool {
        self.progress.done
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Number of wire lines the originating message was split into.
    pub(crate) fn set_pending_lines(&mut self, lines: usize) {
        self.progress.pending_lines = lines.max(1);
    }

    /// First wire line went out: start the timeout clock.
    pub(crate) fn activate(&mut self, now: Instant) {
        if let Some(timeout) = self.progress.timeout {
            self.progress.deadline = Some(now + timeout);
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        !self.progress.done && self.progress.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub(crate) fn handle_reply(&mut self, core: &mut Core, reply: &Message, code: u16) -> bool {
        let HandlerKind::Reply(handler) = &mut self.kind else {
            return false;
        };
        let mut ctx = HandlerContext {
            progress: &mut self.progress,
            core,
        };
        handler.handle_reply(&mut ctx, reply, code)
    }

    pub(crate) fn handle_message(&mut self, core: &mut Core, message: &Message, command: &str) -> bool {
        let HandlerKind::Message(handler) = &mut self.kind else {
            return false;
        };
        let mut ctx = HandlerContext {
            progress: &mut self.progress,
            core,
        };
        handler.handle_message(&mut ctx, message, command)
    }

    /// Marks the handler done and runs its timeout callback exactly once.
    pub(crate) fn expire(&mut self, core: &mut Core) {
        if self.progress.done {
            return;
        }
        self.progress.done = true;
        let mut ctx = HandlerContext {
            progress: &mut self.progress,
            core,
        };
        match &mut self.kind {
            HandlerKind::Reply(h) => h.handle_timeout(&mut ctx),
            HandlerKind::Message(h) => h.handle_timeout(&mut ctx),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name())
            .field("progress", &self.progress)
            .finish()
    }
}

/// What a handler callback gets to work with: its own progress plus the
/// session internals (send path, events, contacts, ...).
pub struct HandlerContext<'a> {
    progress: &'a mut Progress,
    core: &'a mut Core,
}

impl HandlerContext<'_> {
    pub fn complete_line(&mut self) -> bool {
        self.progress.complete_line()
    }

    pub fn is_done(&self) -> bool {
        self.progress.is_done()
    }

    pub fn mark_done(&mut self) {
        self.progress.mark_done();
    }
}

impl Deref for HandlerContext<'_> {
    type Target = Core;

    fn deref(&self) -> &Core {
        self.core
    }
}

impl DerefMut for HandlerContext<'_> {
    fn deref_mut(&mut self) -> &mut Core {
        self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_lines_gate_completion() {
        let mut progress = Progress::default();
        progress.pending_lines = 3;
        assert!(!progress.complete_line());
        assert!(!progress.complete_line());
        assert!(progress.complete_line());
        assert!(progress.is_done());
    }

    #[test]
    fn test_complete_line_saturates() {
        let mut progress = Progress::default();
        assert!(progress.complete_line());
        assert!(progress.complete_line());
        assert_eq!(progress.pending_lines(), 0);
    }
}

//! Owner notifications.
//!
//! The session queues these as things happen; the owner drains them with
//! [`Session::drain_events`](crate::engine::Session::drain_events) after each
//! call into the session.

use crate::irc::support::ModeChange;
use std::net::Ipv4Addr;

/// A channel as shown to the owner (`room`, leading `#` stripped) and as
/// known to the server (`channel`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatTarget {
    pub room: String,
    pub channel: String,
}

impl ChatTarget {
    pub fn new(room: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            channel: channel.into(),
        }
    }
}

/// Everything a completed WHOIS told us about a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisInfo {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub real_name: String,
    pub server: String,
    pub server_info: String,
    pub away_message: String,
    pub logged_in_as: String,
    pub is_operator: bool,
    pub idle_secs: Option<u64>,
    pub signed_on: Option<i64>,
    /// Comma separated, `#` removed.
    pub channels: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Registration accepted; the session is ONLINE.
    ProtocolReady,
    /// The transport went away while the session was active.
    ConnectionLost { retry: bool },
    NicknameChanged { old: String, new: String },
    NicknameInUse { nick: String },

    /// Numeric reply text nobody else claimed.
    ServerMessage { text: String },
    /// Notices from the server itself and WALLOPS.
    ServerInformation { text: String },

    RawReceived { line: String },
    RawSent { line: String },

    /// `nick` is `None` when we are the one joining.
    ChannelJoined {
        target: ChatTarget,
        nick: Option<String>,
        password: Option<String>,
    },
    ChannelLeft {
        target: ChatTarget,
        nick: Option<String>,
        reason: Option<String>,
    },
    Quit { nick: String, reason: Option<String> },
    /// `nick` is `None` when we were kicked.
    Kicked {
        target: ChatTarget,
        nick: Option<String>,
        by: String,
        reason: Option<String>,
    },
    TopicChanged {
        target: ChatTarget,
        by: Option<String>,
        topic: String,
    },
    Invite { from: String, target: ChatTarget },
    /// `by` is `None` for the initial modes reported right after a join.
    ChannelModeChanged {
        target: ChatTarget,
        by: Option<String>,
        change: ModeChange,
    },

    /// `from` is `None` for our own outgoing lines.
    ChannelMessage {
        target: ChatTarget,
        from: Option<String>,
        text: String,
        action: bool,
    },
    PrivateMessage {
        peer: String,
        text: String,
        action: bool,
        outgoing: bool,
    },

    ChannelUser {
        target: ChatTarget,
        nick: String,
        prefix: String,
        op: bool,
        voice: bool,
    },
    ChannelUsersDone { target: ChatTarget },
    ChannelPasswordRequired { target: ChatTarget },
    ChannelListEntry {
        target: ChatTarget,
        users: u32,
        topic: String,
    },
    ChannelListDone,

    NickAway { nick: String, message: String },
    WhoisReply(WhoisInfo),
    /// Host part of our own USERHOST reply. `None` when the server does not
    /// know the command.
    ExternalAddress { host: Option<String> },

    InitialPresence { nick: String },
    PresenceOffline { nick: String },
    PresenceUpdate { nick: String, away_message: String },

    /// A peer offers us a file. `port` is zero for a passive (reverse) offer.
    DccSendRequest {
        from: String,
        filename: String,
        size: u64,
        address: Option<Ipv4Addr>,
        port: u16,
        id: u32,
    },
    /// An accepted offer can be fetched: connect to `address:port` (or, for
    /// a passive offer, wait on the announced listening port) and start at
    /// `position`.
    DccReceiveReady {
        port: u16,
        id: u32,
        position: u64,
    },
    DccReceiveFailed { port: u16, id: u32, from: String, filename: String },
    /// The receiver asked to resume one of our sends; serve from `position`.
    DccResumeRequested { port: u16, id: u32, position: u64 },
    /// Our resume request was accepted by the sender.
    DccResumeAccepted { port: u16, id: u32, position: u64 },
    /// The receiver of a passive send is listening.
    DccPassiveSendReady { id: u32, address: Ipv4Addr, port: u16 },
    DccSendFailed { port: u16, id: u32, to: String, filename: String },
}

//! Concrete reply and message handlers.
//!
//! Each one is attached to a single outgoing command (or installed by the
//! router for an incoming request) and consumes the numerics or messages
//! that belong to it.

use crate::config::CtcpConfig;
use crate::engine::dcc::{DccResume, DccSendOffer};
use crate::engine::event::{Event, WhoisInfo};
use crate::engine::handler::{Handler, HandlerContext, MessageHandler, ReplyHandler};
use crate::engine::scheduler::Priority;
use crate::engine::session::Core;
use crate::irc::format::strip_formatting;
use crate::irc::reply::*;
use crate::irc::support::ban_mask;
use crate::irc::Message;
use std::time::Duration;
use tracing::{debug, warn};

/// Completes when a user-typed command's closing reply arrives, without
/// consuming anything, so the replies still reach generic display.
pub struct DummyHandler {
    closing: &'static [u16],
}

impl DummyHandler {
    pub fn for_message(message: &Message) -> Option<Self> {
        let closing: &'static [u16] = match message.command() {
            "ISON" => &[RPL_ISON],
            "WHO" => &[RPL_ENDOFWHO],
            "AWAY" => &[RPL_UNAWAY, RPL_NOWAWAY],
            "LIST" => &[RPL_LISTEND],
            _ => return None,
        };
        Some(Self { closing })
    }
}

impl ReplyHandler for DummyHandler {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, _reply: &Message, code: u16) -> bool {
        if self.closing.contains(&code) {
            ctx.complete_line();
        }
        false
    }
}

/// Learns the host the server sees us as.
pub struct Userhost;

impl ReplyHandler for Userhost {
    fn name(&self) -> &'static str {
        "userhost"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        let host = match code {
            // nick=+user@host
            RPL_USERHOST => reply
                .param(1)
                .and_then(|entry| entry.split_once('@'))
                .map(|(_, host)| host.trim().to_string())
                .filter(|host| !host.is_empty()),
            ERR_UNKNOWNCOMMAND => None,
            _ => return false,
        };

        debug!(?host, "external host");
        ctx.local.set_external_host(host.clone());
        ctx.emit(Event::ExternalAddress { host });
        ctx.complete_line();
        true
    }
}

/// Collects the numerics of a WHOIS answer into one [`Event::WhoisReply`].
#[derive(Default)]
pub struct Whois {
    info: WhoisInfo,
}

impl ReplyHandler for Whois {
    fn name(&self) -> &'static str {
        "whois"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        let info = &mut self.info;
        let param = |i: usize| reply.param(i).unwrap_or_default().to_string();
        match code {
            RPL_WHOISUSER => {
                info.nick = param(1);
                info.user = param(2);
                info.host = param(3);
                info.real_name = param(5);
            }
            RPL_AWAY => info.away_message = param(2),
            RPL_WHOISSERVER => {
                info.server = param(2);
                info.server_info = param(3);
            }
            RPL_WHOISOPERATOR => info.is_operator = true,
            RPL_WHOISIDLE => {
                info.idle_secs = reply.param(2).and_then(|s| s.parse().ok());
                info.signed_on = reply.param(3).and_then(|s| s.parse().ok());
            }
            RPL_WHOISCHANNELS => {
                info.channels = param(2).trim().replace('#', "").replace(' ', ", ");
            }
            RPL_LOGGEDINAS => info.logged_in_as = param(2),
            RPL_SECURECONNECTION => {}
            RPL_ENDOFWHOIS => {
                if reply.param(1).is_some_and(|nick| nick.eq_ignore_ascii_case(&info.nick)) {
                    ctx.emit(Event::WhoisReply(std::mem::take(info)));
                }
                ctx.complete_line();
            }
            _ => return false,
        }
        true
    }
}

/// Channel list collection. `LIST <10000` is not understood everywhere, so
/// an error or an empty answer falls back to plain LIST once.
#[derive(Debug, Default)]
pub struct ListHandler {
    inside: bool,
    fallback_pending: bool,
    fallback_sent: bool,
    items: usize,
}

impl ListHandler {
    fn send_fallback(&mut self, ctx: &mut HandlerContext<'_>) {
        self.fallback_pending = false;
        self.fallback_sent = true;
        ctx.send_logged(&Message::new("LIST"), Priority::Normal, None, 8);
    }

    fn finish(&mut self, ctx: &mut HandlerContext<'_>) {
        ctx.emit(Event::ChannelListDone);
        ctx.complete_line();
        if self.fallback_sent {
            // Remember for the rest of the connection.
            ctx.extended_list = false;
        }
    }
}

impl ReplyHandler for ListHandler {
    fn name(&self) -> &'static str {
        "list"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        match code {
            RPL_LISTSTART => self.inside = true,
            RPL_LIST => {
                if reply.param_count() >= 4 {
                    let channel = reply.params()[1].as_str();
                    let users = reply.params()[2].parse::<u32>().unwrap_or(0);
                    if !channel.is_empty() && users > 0 {
                        let event = Event::ChannelListEntry {
                            target: ctx.chat_target(channel),
                            users,
                            topic: strip_formatting(&reply.params()[3]),
                        };
                        ctx.emit(event);
                    }
                }
                self.items += 1;
            }
            RPL_LISTEND => {
                if !self.fallback_sent && self.items == 0 {
                    self.fallback_pending = true;
                }
                if self.fallback_pending {
                    self.send_fallback(ctx);
                } else {
                    self.finish(ctx);
                }
            }
            code if is_error(code) || code == RPL_TRYAGAIN => {
                if self.fallback_sent {
                    self.finish(ctx);
                } else if !self.fallback_pending {
                    if self.inside {
                        self.fallback_pending = true;
                    } else {
                        self.send_fallback(ctx);
                    }
                }
            }
            _ => return false,
        }
        true
    }
}

/// Swallows the server's confirmation of our AWAY.
pub struct SuppressAway;

impl ReplyHandler for SuppressAway {
    fn name(&self) -> &'static str {
        "suppress-away"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, _reply: &Message, code: u16) -> bool {
        if matches!(code, RPL_UNAWAY | RPL_NOWAWAY) {
            ctx.complete_line();
            return true;
        }
        false
    }
}

/// Swallows the message of the day sent after registration.
pub struct SuppressMotd;

impl ReplyHandler for SuppressMotd {
    fn name(&self) -> &'static str {
        "suppress-motd"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, _reply: &Message, code: u16) -> bool {
        match code {
            RPL_MOTDSTART | RPL_MOTD => true,
            RPL_ENDOFMOTD | ERR_NOMOTD => {
                ctx.complete_line();
                true
            }
            _ => false,
        }
    }
}

/// Reports the modes a channel already has when we join it.
pub struct InitialMode;

impl ReplyHandler for InitialMode {
    fn name(&self) -> &'static str {
        "initial-mode"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        if code != RPL_CHANNELMODEIS {
            return false;
        }
        ctx.report_mode_changes(reply, true);
        ctx.complete_line();
        true
    }
}

/// Turns the WHO answer for a nick into a `MODE +b` on its user and host.
pub struct BanWho {
    nick: String,
    channel: String,
}

impl BanWho {
    pub fn new(nick: &str, channel: &str) -> Self {
        Self {
            nick: nick.to_string(),
            channel: channel.to_string(),
        }
    }
}

impl ReplyHandler for BanWho {
    fn name(&self) -> &'static str {
        "ban-who"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        match code {
            RPL_WHOREPLY => {
                if reply.param_count() > 5 && reply.params()[5].eq_ignore_ascii_case(&self.nick) {
                    let mask = ban_mask(&reply.params()[2], &reply.params()[3]);
                    let mode = Message::new("MODE")
                        .with_param(&self.channel)
                        .with_param("+b")
                        .with_param(mask);
                    ctx.send_logged(&mode, Priority::Normal, None, 0);
                }
                true
            }
            RPL_ENDOFWHO => {
                ctx.complete_line();
                true
            }
            _ => false,
        }
    }
}

/// Answers CTCP requests, at most `max_requests` replies per window. Every
/// request that arrives while no limiter is active opens a new window.
pub struct CtcpLimiter {
    replies: u32,
    max_requests: u32,
    interval: u32,
}

impl CtcpLimiter {
    pub fn handler(config: &CtcpConfig) -> Handler {
        let limiter = Self {
            replies: 0,
            max_requests: config.max_requests,
            interval: config.request_interval_secs,
        };
        Handler::message(limiter).with_timeout(Duration::from_secs(u64::from(config.request_interval_secs)))
    }
}

impl MessageHandler for CtcpLimiter {
    fn name(&self) -> &'static str {
        "ctcp-limiter"
    }

    fn handle_message(&mut self, ctx: &mut HandlerContext<'_>, message: &Message, command: &str) -> bool {
        if !message.is_ctcp() || command != "PRIVMSG" {
            return false;
        }

        let handled = if self.replies < self.max_requests {
            let outcome = ctx.respond_to_ctcp(message);
            if outcome.replied {
                self.replies += 1;
            }
            outcome.handled
        } else {
            warn!(from = message.sender(), "CTCP flood, request dropped");
            true
        };

        if self.interval == 0 {
            ctx.complete_line();
        }
        handled
    }
}

/// What answering one CTCP request amounted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CtcpOutcome {
    pub handled: bool,
    /// Counts against the reply limit.
    pub replied: bool,
}

impl Core {
    pub(crate) fn respond_to_ctcp(&mut self, message: &Message) -> CtcpOutcome {
        let mut outcome = CtcpOutcome::default();
        let Some(info) = message.ctcp_info() else {
            return outcome;
        };
        let sender = message.sender().to_string();
        let destination = message.param(0).unwrap_or_default();

        match info.kind() {
            "ACTION" if info.param_count() > 0 => {
                let text = info.raw_params().to_string();
                let event = if self.support.is_channel(destination) {
                    Event::ChannelMessage {
                        target: self.chat_target(destination),
                        from: Some(sender),
                        text,
                        action: true,
                    }
                } else {
                    Event::PrivateMessage {
                        peer: sender,
                        text,
                        action: true,
                        outgoing: false,
                    }
                };
                self.emit(event);
                outcome.handled = true;
            }
            "PING" if message.param_count() >= 2 => {
                if self.config.ctcp.reply_ping {
                    let pong = Message::ctcp("NOTICE", &sender, message.params()[1].clone());
                    self.send_logged(&pong, Priority::Normal, None, 0);
                    outcome.replied = true;
                }
                outcome.handled = true;
            }
            "VERSION" => {
                if self.config.ctcp.reply_version {
                    let payload = format!("VERSION {}", self.config.ctcp.version_string);
                    self.send_logged(&Message::ctcp("NOTICE", &sender, payload), Priority::Normal, None, 0);
                    outcome.replied = true;
                }
                outcome.handled = true;
            }
            "TIME" => {
                if self.config.ctcp.reply_time {
                    let payload = format!("TIME {}", self.host.current_time().format("%a %b %e %H:%M:%S %Y"));
                    self.send_logged(&Message::ctcp("NOTICE", &sender, payload), Priority::Normal, None, 0);
                    outcome.replied = true;
                }
                outcome.handled = true;
            }
            "DCC" if info.param_count() > 0 => {
                if let Some(offer) = DccSendOffer::parse(&info) {
                    self.receive_offer(&sender, offer);
                    outcome.handled = true;
                } else if let Some(resume) = DccResume::parse(&info, "RESUME") {
                    self.resume_requested(resume);
                    outcome.handled = true;
                } else {
                    debug!(from = %sender, payload = info.raw_params(), "ignoring DCC request");
                }
                outcome.replied = true;
            }
            _ => {}
        }
        outcome
    }
}

/// Waits for the sender's `DCC ACCEPT` after we asked to resume.
pub struct DccResumeWait {
    port: u16,
    id: u32,
}

impl DccResumeWait {
    pub fn handler(port: u16, id: u32, timeout_secs: u64) -> Handler {
        Handler::message(Self { port, id }).with_timeout(Duration::from_secs(timeout_secs))
    }
}

impl MessageHandler for DccResumeWait {
    fn name(&self) -> &'static str {
        "dcc-resume"
    }

    fn handle_message(&mut self, ctx: &mut HandlerContext<'_>, message: &Message, command: &str) -> bool {
        if command != "PRIVMSG" {
            return false;
        }
        let Some(accept) = message.ctcp_info().and_then(|info| DccResume::parse(&info, "ACCEPT")) else {
            return false;
        };
        let ours = if self.port != 0 {
            accept.port == self.port
        } else {
            accept.port == 0 && accept.id == self.id
        };
        if !ours {
            return false;
        }

        ctx.resume_accepted(self.port, self.id, accept.position);
        ctx.complete_line();
        true
    }

    fn handle_timeout(&mut self, ctx: &mut HandlerContext<'_>) {
        warn!(port = self.port, id = self.id, "DCC resume not accepted in time");
        ctx.fail_receive(self.port, self.id);
    }
}

/// Waits for the receiver of a passive send to announce where it listens.
pub struct PassiveSendWait {
    id: u32,
}

impl PassiveSendWait {
    pub fn handler(id: u32, timeout_secs: u64) -> Handler {
        Handler::message(Self { id }).with_timeout(Duration::from_secs(timeout_secs))
    }
}

impl MessageHandler for PassiveSendWait {
    fn name(&self) -> &'static str {
        "dcc-passive-send"
    }

    fn handle_message(&mut self, ctx: &mut HandlerContext<'_>, message: &Message, command: &str) -> bool {
        if command != "PRIVMSG" {
            return false;
        }
        let Some(info) = message.ctcp_info() else {
            return false;
        };
        if info.param_count() <= 5 {
            return false;
        }
        let Some(answer) = DccSendOffer::parse(&info).filter(|offer| offer.id == self.id) else {
            return false;
        };

        ctx.emit(Event::DccPassiveSendReady {
            id: self.id,
            address: answer.address,
            port: answer.port,
        });
        ctx.complete_line();
        true
    }

    fn handle_timeout(&mut self, ctx: &mut HandlerContext<'_>) {
        warn!(id = self.id, "passive DCC send was not answered in time");
        ctx.fail_send(0, self.id);
    }
}

/// Looks up a DCC peer's host before sending it our `DCC SEND`, so the
/// advertised address can be picked for it.
pub struct DccWho {
    nick: String,
    port: u16,
    id: u32,
    sending: bool,
}

impl DccWho {
    pub fn for_send(nick: &str, port: u16, id: u32) -> Self {
        Self {
            nick: nick.to_string(),
            port,
            id,
            sending: true,
        }
    }

    pub fn for_receive(nick: &str, port: u16, id: u32) -> Self {
        Self {
            nick: nick.to_string(),
            port,
            id,
            sending: false,
        }
    }
}

impl ReplyHandler for DccWho {
    fn name(&self) -> &'static str {
        "dcc-who"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        match code {
            RPL_WHOREPLY => {
                if reply.param_count() > 5 && reply.params()[5].eq_ignore_ascii_case(&self.nick) {
                    let host = reply.params()[3].clone();
                    if self.sending {
                        ctx.announce_send(self.port, self.id, &host);
                    } else {
                        ctx.announce_passive_receive(self.port, self.id, &host);
                    }
                }
                true
            }
            RPL_ENDOFWHO => {
                ctx.complete_line();
                true
            }
            _ => false,
        }
    }
}

/// One ISON poll. Completes once every line of a folded ISON is answered.
pub struct PresenceIson;

impl ReplyHandler for PresenceIson {
    fn name(&self) -> &'static str {
        "presence-ison"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        if code != RPL_ISON {
            return false;
        }
        let online = reply.param(1).unwrap_or_default().to_string();
        for nick in online.split_whitespace() {
            ctx.contact_seen(nick);
        }
        if ctx.complete_line() {
            ctx.finish_poll();
        }
        true
    }
}

/// WHO on an online contact, to read its away flag.
pub struct PresenceWho {
    nick: String,
}

impl PresenceWho {
    pub fn new(nick: &str) -> Self {
        Self { nick: nick.to_string() }
    }
}

impl ReplyHandler for PresenceWho {
    fn name(&self) -> &'static str {
        "presence-who"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        match code {
            RPL_WHOREPLY => {
                if reply.param_count() > 6 && reply.params()[5].eq_ignore_ascii_case(&self.nick) {
                    let status = reply.params()[6].clone();
                    ctx.contact_status(&self.nick, &status);
                }
                true
            }
            RPL_ENDOFWHO => {
                ctx.complete_line();
                true
            }
            _ => false,
        }
    }
}

/// WHOIS on a gone contact, to read its away text. The rest of the answer
/// is swallowed.
#[derive(Default)]
pub struct PresenceWhois {
    away_message: String,
}

impl ReplyHandler for PresenceWhois {
    fn name(&self) -> &'static str {
        "presence-whois"
    }

    fn handle_reply(&mut self, ctx: &mut HandlerContext<'_>, reply: &Message, code: u16) -> bool {
        match code {
            RPL_WHOISUSER | RPL_WHOISSERVER | RPL_WHOISOPERATOR | RPL_WHOISIDLE
            | RPL_WHOISCHANNELS | RPL_LOGGEDINAS | RPL_SECURECONNECTION => true,
            RPL_AWAY => {
                self.away_message = reply.param(2).unwrap_or_default().to_string();
                true
            }
            RPL_ENDOFWHOIS => {
                let nick = reply.param(1).unwrap_or_default().to_string();
                ctx.contact_away(&nick, &self.away_message);
                ctx.complete_line();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CtcpConfig, SessionConfig};
    use crate::engine::event::ChatTarget;
    use crate::engine::session::tests::{feed, online_session};
    use std::time::Instant;

    fn without_raw(events: Vec<Event>) -> Vec<Event> {
        events
            .into_iter()
            .filter(|e| !matches!(e, Event::RawSent { .. } | Event::RawReceived { .. }))
            .collect()
    }

    #[test]
    fn test_userhost_sets_external_host() {
        let t0 = Instant::now();
        let (mut session, _wire) = online_session(SessionConfig::default(), t0);
        feed(&mut session, ":irc.example.net 302 crab :crab=+crab@203.0.113.9 ", t0);

        assert_eq!(
            without_raw(session.drain_events()),
            [Event::ExternalAddress {
                host: Some("203.0.113.9".to_string())
            }]
        );
        assert_eq!(session.core().local_address().external_host(), Some("203.0.113.9"));
    }

    #[test]
    fn test_whois_accumulates_until_end() {
        let t0 = Instant::now();
        let (mut session, _wire) = online_session(SessionConfig::default(), t0);
        for line in [
            ":irc.example.net 311 crab alice ~a host.example * :Alice Liddell",
            ":irc.example.net 312 crab alice irc.example.net :Example server",
            ":irc.example.net 319 crab alice :@#rust #crabs",
            ":irc.example.net 317 crab alice 42 1700000000 :seconds idle, signon time",
            ":irc.example.net 318 crab alice :End of /WHOIS list.",
        ] {
            feed(&mut session, line, t0);
        }

        let events = without_raw(session.drain_events());
        let [Event::WhoisReply(info)] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(info.nick, "alice");
        assert_eq!(info.host, "host.example");
        assert_eq!(info.real_name, "Alice Liddell");
        assert_eq!(info.server, "irc.example.net");
        assert_eq!(info.channels, "@rust, crabs");
        assert_eq!(info.idle_secs, Some(42));
        assert_eq!(info.signed_on, Some(1_700_000_000));
        assert_eq!(session.router().active_count(), 2);
    }

    #[test]
    fn test_list_falls_back_to_plain_list() {
        let t0 = Instant::now();
        let (mut session, wire) = online_session(SessionConfig::default(), t0);

        session.list_channels(t0).unwrap();
        assert!(wire.sent().is_empty());
        session.tick(t0 + Duration::from_secs(2));
        session.tick(t0 + Duration::from_secs(3));
        assert_eq!(wire.take(), ["LIST <10000"]);

        let t1 = t0 + Duration::from_secs(3);
        feed(&mut session, ":irc.example.net 321 crab Channel :Users  Name", t1);
        feed(&mut session, ":irc.example.net 323 crab :End of /LIST", t1);
        assert!(!without_raw(session.drain_events()).contains(&Event::ChannelListDone));

        for second in 4..=12 {
            session.tick(t0 + Duration::from_secs(second));
        }
        assert_eq!(wire.take(), ["LIST"]);

        let t2 = t0 + Duration::from_secs(12);
        feed(&mut session, ":irc.example.net 322 crab #rust 12 :\u{2}Rust\u{2} talk", t2);
        feed(&mut session, ":irc.example.net 322 crab #empty 0 :nobody", t2);
        feed(&mut session, ":irc.example.net 323 crab :End of /LIST", t2);

        assert_eq!(
            without_raw(session.drain_events()),
            [
                Event::ChannelListEntry {
                    target: ChatTarget::new("rust", "#rust"),
                    users: 12,
                    topic: "Rust talk".to_string(),
                },
                Event::ChannelListDone,
            ]
        );
        assert!(!session.core().extended_list);
    }

    #[test]
    fn test_ban_looks_up_host_first() {
        let t0 = Instant::now();
        let (mut session, wire) = online_session(SessionConfig::default(), t0);

        session.ban("#rust", "troll", t0).unwrap();
        assert_eq!(wire.take(), ["WHO troll"]);

        // Budget is spent after WHO; give it a moment.
        let t1 = t0 + Duration::from_secs(5);
        for second in 1..=5 {
            session.tick(t0 + Duration::from_secs(second));
        }
        feed(&mut session, ":irc.example.net 352 crab * ~troll 198.51.100.7 irc.example.net troll H :0 Troll", t1);
        feed(&mut session, ":irc.example.net 315 crab troll :End of WHO list", t1);
        assert_eq!(wire.take(), ["MODE #rust +b *!*troll@198.51.100.*"]);
    }

    #[test]
    fn test_ctcp_replies_are_rate_limited() {
        let config = SessionConfig {
            ctcp: CtcpConfig {
                max_requests: 2,
                ..CtcpConfig::default()
            },
            ..SessionConfig::default()
        };
        let t0 = Instant::now();
        let (mut session, wire) = online_session(config, t0);

        for i in 0..4 {
            feed(&mut session, &format!(":bob!b@h PRIVMSG crab :\u{1}PING {i}\u{1}"), t0);
        }
        assert_eq!(
            wire.take(),
            ["NOTICE bob :\u{1}PING 0\u{1}", "NOTICE bob :\u{1}PING 1\u{1}"]
        );

        // A new window opens once the limiter has expired.
        let t1 = t0 + Duration::from_secs(10);
        session.tick(t1);
        session.tick(t1 + Duration::from_secs(1));
        wire.take();
        feed(&mut session, ":bob!b@h PRIVMSG crab :\u{1}VERSION\u{1}", t1);
        let version = CtcpConfig::default().version_string;
        assert_eq!(wire.take(), [format!("NOTICE bob :\u{1}VERSION {version}\u{1}")]);
    }

    #[test]
    fn test_ctcp_action_is_reported() {
        let t0 = Instant::now();
        let (mut session, wire) = online_session(SessionConfig::default(), t0);
        feed(&mut session, ":bob!b@h PRIVMSG #rust :\u{1}ACTION waves\u{1}", t0);

        assert!(wire.sent().is_empty());
        assert_eq!(
            without_raw(session.drain_events()),
            [Event::ChannelMessage {
                target: ChatTarget::new("rust", "#rust"),
                from: Some("bob".to_string()),
                text: "waves".to_string(),
                action: true,
            }]
        );
    }

    #[test]
    fn test_ctcp_time_uses_host_clock() {
        let t0 = Instant::now();
        let (mut session, wire) = online_session(SessionConfig::default(), t0);
        feed(&mut session, ":bob!b@h PRIVMSG crab :\u{1}TIME\u{1}", t0);
        assert_eq!(wire.take(), ["NOTICE bob :\u{1}TIME Wed May  1 12:00:00 2024\u{1}"]);
    }

    #[test]
    fn test_suppress_away_confirmation() {
        let t0 = Instant::now();
        let (mut session, wire) = online_session(SessionConfig::default(), t0);
        session.set_away(Some("lunch"), t0).unwrap();
        assert_eq!(wire.take(), ["AWAY lunch"]);

        feed(&mut session, ":irc.example.net 306 crab :You have been marked as being away", t0);
        assert!(without_raw(session.drain_events()).is_empty());
    }
}

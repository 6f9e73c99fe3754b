//! Connection state machine and public command surface.
//!
//! [`Session`] is driven entirely from the outside: the owner forwards
//! transport callbacks ([`on_transport_ready`](Session::on_transport_ready),
//! [`on_data`](Session::on_data), [`on_transport_closed`](Session::on_transport_closed)),
//! calls [`tick`](Session::tick) once a second, and drains [`Event`]s after
//! every call. Each entry point takes the current [`Instant`]; the session
//! never reads a clock on its own.

use crate::config::SessionConfig;
use crate::engine::dcc::{DccSessions, LocalAddress};
use crate::engine::event::{ChatTarget, Event};
use crate::engine::handler::Handler;
use crate::engine::handlers::{BanWho, DummyHandler, ListHandler, SuppressAway};
use crate::engine::presence::Contacts;
use crate::engine::router::Router;
use crate::engine::scheduler::{FloodScheduler, Outgoing, Priority, Transmit};
use crate::error::{Result, SessionError};
use crate::irc::{Message, ServerSupport};
use crate::transport::{ConnectTarget, Transport};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Synchronous questions the session asks its owner.
pub trait Host {
    /// Character set used on the wire, e.g. `"utf-8"` or `"iso-8859-1"`.
    fn charset(&self) -> String;
    /// Wall-clock time, for CTCP PING stamps and TIME replies.
    fn current_time(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone)]
pub struct SystemHost {
    charset: String,
}

impl SystemHost {
    pub fn new(charset: impl Into<String>) -> Self {
        Self {
            charset: charset.into(),
        }
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new("utf-8")
    }
}

impl Host for SystemHost {
    fn charset(&self) -> String {
        self.charset.clone()
    }

    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Offline,
    Connecting,
    Online,
}

/// What [`Session::initiate`] needs to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub server: String,
    pub port: u16,
    pub password: Option<String>,
    pub nick: String,
    pub user: String,
    pub realname: String,
    pub tls: bool,
}

/// Session internals shared with handlers. Handlers reach it through
/// [`HandlerContext`](crate::engine::handler::HandlerContext).
pub struct Core {
    pub(crate) config: SessionConfig,
    pub(crate) now: Instant,
    pub(crate) state: SessionState,
    pub(crate) params: Option<ConnectParams>,
    pub(crate) nick: String,
    pub(crate) registration_started: bool,
    pub(crate) support: ServerSupport,
    pub(crate) scheduler: FloodScheduler,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) host: Box<dyn Host>,
    pub(crate) events: VecDeque<Event>,
    pub(crate) contacts: Contacts,
    pub(crate) dcc: DccSessions,
    pub(crate) local: LocalAddress,
    /// An ISON poll is queued or still waiting for answers.
    pub(crate) polling: bool,
    /// Handlers whose first line went out since the router last looked.
    pub(crate) activated: Vec<Handler>,
    /// Whether `LIST <10000` is still worth trying.
    pub(crate) extended_list: bool,
    pub(crate) latin1: bool,
    pub(crate) transport_failed: bool,
}

/// The scheduler's view of the send path.
struct Outbox<'a> {
    transport: &'a mut dyn Transport,
    events: &'a mut VecDeque<Event>,
    activated: &'a mut Vec<Handler>,
    now: Instant,
    latin1: bool,
    failed: &'a mut bool,
}

impl Transmit for Outbox<'_> {
    fn transmit(&mut self, line: &str, handler: Option<Handler>) {
        debug!(line, "-> server");
        let mut bytes = encode(line, self.latin1);
        bytes.extend_from_slice(b"\r\n");
        if let Err(err) = self.transport.send(bytes) {
            warn!(%err, "write failed");
            *self.failed = true;
        }
        self.events.push_back(Event::RawSent {
            line: line.to_string(),
        });

        if let Some(mut handler) = handler {
            handler.activate(self.now);
            self.activated.push(handler);
        }
    }
}

fn encode(line: &str, latin1: bool) -> Vec<u8> {
    if latin1 {
        line.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect()
    } else {
        line.as_bytes().to_vec()
    }
}

fn decode(bytes: &[u8], latin1: bool) -> String {
    if latin1 {
        bytes.iter().copied().map(char::from).collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn is_latin1(charset: &str) -> bool {
    matches!(
        charset.to_ascii_lowercase().as_str(),
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1"
    )
}

impl Core {
    fn new(config: SessionConfig, transport: Box<dyn Transport>, host: Box<dyn Host>) -> Self {
        Self {
            scheduler: FloodScheduler::new(config.flood.clone()),
            config,
            now: Instant::now(),
            state: SessionState::Offline,
            params: None,
            nick: String::new(),
            registration_started: false,
            support: ServerSupport::default(),
            transport,
            host,
            events: VecDeque::new(),
            contacts: Contacts::default(),
            dcc: DccSessions::default(),
            local: LocalAddress::default(),
            polling: false,
            activated: Vec::new(),
            extended_list: true,
            latin1: false,
            transport_failed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn support(&self) -> &ServerSupport {
        &self.support
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    pub fn dcc_sessions(&self) -> &DccSessions {
        &self.dcc
    }

    pub fn local_address(&self) -> &LocalAddress {
        &self.local
    }

    pub fn scheduler(&self) -> &FloodScheduler {
        &self.scheduler
    }

    /// Current time as passed into the entry point being served.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.host.current_time()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn is_own_nick(&self, nick: &str) -> bool {
        !self.nick.is_empty() && self.nick.eq_ignore_ascii_case(nick)
    }

    pub fn chat_target(&self, channel: &str) -> ChatTarget {
        ChatTarget::new(self.support.strip_channel_prefix(channel), channel)
    }

    /// Serialize `message` and hand every wire line to the scheduler. The
    /// handler rides with the first line and waits for as many completions
    /// as there are lines. Returns the number of lines.
    pub fn send_message(
        &mut self,
        message: &Message,
        priority: Priority,
        handler: Option<Handler>,
        delay_secs: u32,
    ) -> Result<usize> {
        self.send_lines(message, priority, handler, delay_secs, false)
    }

    /// [`send_message`](Self::send_message) for callers that cannot do
    /// anything about a failure but log it.
    pub fn send_logged(
        &mut self,
        message: &Message,
        priority: Priority,
        handler: Option<Handler>,
        delay_secs: u32,
    ) {
        if let Err(err) = self.send_message(message, priority, handler, delay_secs) {
            warn!(%err, command = message.command(), "could not send");
        }
    }

    fn send_lines(
        &mut self,
        message: &Message,
        priority: Priority,
        mut handler: Option<Handler>,
        delay_secs: u32,
        notify_owner: bool,
    ) -> Result<usize> {
        let lines = message.to_lines(self.config.connection.max_line_len);
        let count = lines.len();
        if let Some(handler) = handler.as_mut() {
            handler.set_pending_lines(count);
        }

        for (index, line) in lines.into_iter().enumerate() {
            if notify_owner {
                self.echo_outgoing(&line);
            }
            let mut outbox = Outbox {
                transport: self.transport.as_mut(),
                events: &mut self.events,
                activated: &mut self.activated,
                now: self.now,
                latin1: self.latin1,
                failed: &mut self.transport_failed,
            };
            let line_handler = if index == 0 { handler.take() } else { None };
            let outgoing = Outgoing::new(message.command(), line, priority)
                .with_handler(line_handler)
                .delayed(delay_secs);
            self.scheduler
                .send(outgoing, self.now, &mut outbox)
                .map_err(|_| SessionError::OutOfMemory)?;
        }
        Ok(count)
    }

    /// Show a user-typed JOIN/PRIVMSG/NOTICE to the owner as if it had
    /// come back from the server.
    fn echo_outgoing(&mut self, line: &str) {
        let Ok(sent) = Message::parse(line) else {
            return;
        };
        let Some(target) = sent.param(0) else {
            return;
        };

        if sent.is_command("JOIN") {
            if self.support.is_channel(target) {
                let event = Event::ChannelJoined {
                    target: self.chat_target(target),
                    nick: None,
                    password: sent.param(1).map(str::to_string),
                };
                self.emit(event);
            }
            return;
        }

        if !(sent.is_command("PRIVMSG") || sent.is_command("NOTICE")) || sent.param_count() < 2 {
            return;
        }
        let (text, action) = match sent.ctcp_info() {
            Some(info) if info.is("ACTION") => (info.raw_params().to_string(), sent.is_command("PRIVMSG")),
            Some(_) => return,
            None => (sent.params()[1].clone(), false),
        };

        let event = if self.support.is_channel(target) {
            Event::ChannelMessage {
                target: self.chat_target(target),
                from: None,
                text,
                action,
            }
        } else {
            Event::PrivateMessage {
                peer: target.to_string(),
                text,
                action,
                outgoing: true,
            }
        };
        self.emit(event);
    }

    /// Report a MODE line or RPL_CHANNELMODEIS one change at a time.
    pub(crate) fn report_mode_changes(&mut self, message: &Message, initial: bool) {
        let Some((channel, changes)) = self.support.parse_mode_changes(message) else {
            return;
        };
        let target = self.chat_target(&channel);
        let by = (!initial).then(|| message.sender().to_string());
        for change in changes {
            self.emit(Event::ChannelModeChanged {
                target: target.clone(),
                by: by.clone(),
                change,
            });
        }
    }

    fn reset_connection(&mut self) {
        self.state = SessionState::Offline;
        self.nick.clear();
        self.params = None;
        self.registration_started = false;
        self.support = ServerSupport::default();
        self.scheduler.reset();
        self.activated.clear();
        self.contacts.clear();
        self.polling = false;
        self.dcc.clear();
        self.local = LocalAddress::default();
        self.extended_list = true;
        self.transport_failed = false;
        self.transport.close();
    }
}

/// One IRC connection's worth of protocol state.
pub struct Session {
    pub(crate) core: Core,
    pub(crate) router: Router,
    read_buffer: Vec<u8>,
}

impl Session {
    pub fn new(config: SessionConfig, transport: Box<dyn Transport>, host: Box<dyn Host>) -> Self {
        Self {
            core: Core::new(config, transport, host),
            router: Router::default(),
            read_buffer: Vec::new(),
        }
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn state(&self) -> SessionState {
        self.core.state
    }

    pub fn nick(&self) -> &str {
        &self.core.nick
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.core.events.drain(..).collect()
    }

    /// Start connecting. Fails when a connection is already in progress or
    /// established.
    pub fn initiate(&mut self, params: ConnectParams, now: Instant) -> Result<()> {
        if self.core.state != SessionState::Offline {
            return Err(SessionError::AlreadyActive);
        }

        self.core.now = now;
        self.core.latin1 = is_latin1(&self.core.host.charset());
        let target = ConnectTarget {
            host: params.server.clone(),
            service: "irc",
            port: params.port,
            tls: params.tls,
            idle_timeout: Duration::from_secs(self.core.config.connection.idle_timeout_secs),
            accept_invalid_certs: self.core.config.connection.accept_invalid_certs,
        };

        info!(server = %params.server, port = params.port, tls = params.tls, nick = %params.nick, "connecting");
        self.core.nick = params.nick.clone();
        self.core.params = Some(params);
        self.core.registration_started = false;
        self.core.state = SessionState::Connecting;

        if let Err(err) = self.core.transport.connect(&target) {
            warn!(%err, "connect failed");
            self.teardown();
            return Err(err.into());
        }
        Ok(())
    }

    /// The transport can carry data. Sends PASS (when there is a password),
    /// NICK and USER exactly once per connection attempt. `local_ip` is the
    /// address of our end of the socket, advertised in DCC offers when
    /// nothing better is known.
    pub fn on_transport_ready(&mut self, local_ip: Option<Ipv4Addr>, now: Instant) -> Result<()> {
        if self.core.state != SessionState::Connecting || self.core.registration_started {
            return Ok(());
        }
        let Some(params) = self.core.params.clone() else {
            return Ok(());
        };

        self.core.now = now;
        self.core.registration_started = true;
        if let Some(ip) = local_ip {
            self.core.local.set_local_ip(ip);
        }

        let result = self.register(&params);
        self.settle();
        result
    }

    fn register(&mut self, params: &ConnectParams) -> Result<()> {
        let core = &mut self.core;
        if let Some(password) = params.password.as_deref().filter(|p| !p.is_empty()) {
            core.send_message(&Message::new("PASS").with_param(password), Priority::Normal, None, 0)?;
        }
        core.send_message(&Message::new("NICK").with_param(&params.nick), Priority::Normal, None, 0)?;
        // Mode bitmask 8: ask for +i.
        let user = Message::new("USER")
            .with_param(&params.user)
            .with_param("8")
            .with_param("*")
            .with_param(&params.realname);
        core.send_message(&user, Priority::Normal, None, 0)?;
        Ok(())
    }

    /// Feed received bytes. Complete lines are dispatched right away; a
    /// trailing partial line waits for the next call.
    pub fn on_data(&mut self, data: &[u8], now: Instant) {
        if self.core.state == SessionState::Offline {
            return;
        }
        self.core.now = now;
        self.read_buffer.extend_from_slice(data);

        while let Some(newline) = self.read_buffer.iter().position(|&b| b == b'\n') {
            let mut raw: Vec<u8> = self.read_buffer.drain(..=newline).collect();
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            let line = decode(&raw, self.core.latin1);
            self.process_line(&line);

            if self.core.state == SessionState::Offline {
                break;
            }
        }
    }

    fn process_line(&mut self, line: &str) {
        debug!(line, "<- server");
        self.core.emit(Event::RawReceived {
            line: line.to_string(),
        });

        match Message::parse(line) {
            Ok(message) => self.router.dispatch(&mut self.core, &message),
            Err(err) => warn!(%err, line, "dropping unparsable line"),
        }
        self.settle();
    }

    /// The transport closed. Unless we were already offline this is a lost
    /// connection; `error` says whether it went down because of a failure,
    /// which is also the retry hint given to the owner.
    pub fn on_transport_closed(&mut self, error: bool, now: Instant) {
        self.core.now = now;
        self.connection_lost(error);
    }

    /// One-second timer: drains the send queues and expires handlers.
    pub fn tick(&mut self, now: Instant) {
        self.core.now = now;
        let core = &mut self.core;
        let mut outbox = Outbox {
            transport: core.transport.as_mut(),
            events: &mut core.events,
            activated: &mut core.activated,
            now,
            latin1: core.latin1,
            failed: &mut core.transport_failed,
        };
        core.scheduler.tick(now, &mut outbox);
        self.settle();

        self.router.expire(&mut self.core, now);
        self.settle();
    }

    /// Disconnect. A polite termination while online says QUIT first; the
    /// transport is closed either way.
    pub fn terminate(&mut self, reason: Option<&str>, polite: bool, now: Instant) {
        self.core.now = now;
        if self.core.state == SessionState::Online && polite {
            let mut quit = Message::new("QUIT");
            if let Some(reason) = reason.filter(|r| !r.is_empty()) {
                quit.push_param(reason);
            }
            self.core.send_logged(&quit, Priority::High, None, 0);
        }
        info!(polite, "terminating session");
        self.teardown();
    }

    fn connection_lost(&mut self, retry: bool) {
        if self.core.state == SessionState::Offline {
            return;
        }
        warn!(retry, "connection lost");
        self.teardown();
        self.core.emit(Event::ConnectionLost { retry });
    }

    fn teardown(&mut self) {
        self.core.reset_connection();
        self.router.clear();
        self.read_buffer.clear();
    }

    /// Move freshly activated handlers into the router and react to write
    /// failures seen along the way.
    fn settle(&mut self) {
        self.router.adopt(&mut self.core.activated);
        if self.core.transport_failed {
            self.connection_lost(true);
        }
    }

    fn command<T>(&mut self, now: Instant, f: impl FnOnce(&mut Core) -> Result<T>) -> Result<T> {
        if self.core.state == SessionState::Offline {
            return Err(SessionError::NotOnline);
        }
        self.core.now = now;
        let result = f(&mut self.core);
        self.settle();
        result
    }

    fn send_simple(&mut self, message: Message, now: Instant) -> Result<()> {
        self.command(now, |core| {
            core.send_message(&message, Priority::Normal, None, 0)?;
            Ok(())
        })
    }

    /// Join `room`; a `#` is added unless the name already carries a
    /// channel prefix.
    pub fn join_channel(&mut self, room: &str, password: Option<&str>, now: Instant) -> Result<()> {
        let mut join = Message::new("JOIN").with_param(self.core.support.prefix_channel(room));
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            join.push_param(password);
        }
        self.send_simple(join, now)
    }

    pub fn leave_channel(&mut self, channel: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::new("PART").with_param(channel), now)
    }

    /// Request the channel list. `LIST <10000` is tried first (smaller
    /// answer on big networks) and plain LIST is used if the server does not
    /// take it.
    pub fn list_channels(&mut self, now: Instant) -> Result<()> {
        self.command(now, |core| {
            let mut list = Message::new("LIST");
            if core.extended_list {
                list.push_param("<10000");
            }
            let handler = Handler::reply(ListHandler::default());
            core.send_message(&list, Priority::Normal, Some(handler), 2)?;
            Ok(())
        })
    }

    pub fn send_channel_message(&mut self, channel: &str, text: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::new("PRIVMSG").with_param(channel).with_param(text), now)
    }

    pub fn send_private_message(&mut self, nick: &str, text: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::new("PRIVMSG").with_param(nick).with_param(text), now)
    }

    /// `/me` to a channel or a nick.
    pub fn send_action(&mut self, target: &str, text: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::ctcp("PRIVMSG", target, format!("ACTION {text}")), now)
    }

    pub fn whois(&mut self, nick: &str, now: Instant) -> Result<()> {
        // Asking the user's own server gets us the idle time too.
        self.send_simple(Message::new("WHOIS").with_param(nick).with_param(nick), now)
    }

    pub fn set_nick(&mut self, nick: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::new("NICK").with_param(nick), now)
    }

    /// Mark ourselves away, or back when `message` is `None`. The server's
    /// confirmation is swallowed.
    pub fn set_away(&mut self, message: Option<&str>, now: Instant) -> Result<()> {
        let mut away = Message::new("AWAY");
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            away.push_param(message);
        }
        self.command(now, |core| {
            core.send_message(&away, Priority::Normal, Some(Handler::reply(SuppressAway)), 0)?;
            Ok(())
        })
    }

    pub fn set_topic(&mut self, channel: &str, topic: &str, now: Instant) -> Result<()> {
        self.send_simple(Message::new("TOPIC").with_param(channel).with_param(topic), now)
    }

    /// `mode` is a signed mode string such as `+m`, `-t` or `+l`.
    pub fn set_channel_mode(
        &mut self,
        channel: &str,
        mode: &str,
        parameter: Option<&str>,
        now: Instant,
    ) -> Result<()> {
        let mut message = Message::new("MODE").with_param(channel).with_param(mode);
        if let Some(parameter) = parameter {
            message.push_param(parameter);
        }
        self.send_simple(message, now)
    }

    pub fn op(&mut self, channel: &str, nick: &str, grant: bool, now: Instant) -> Result<()> {
        self.set_channel_mode(channel, if grant { "+o" } else { "-o" }, Some(nick), now)
    }

    pub fn voice(&mut self, channel: &str, nick: &str, grant: bool, now: Instant) -> Result<()> {
        self.set_channel_mode(channel, if grant { "+v" } else { "-v" }, Some(nick), now)
    }

    pub fn kick(&mut self, channel: &str, nick: &str, reason: Option<&str>, now: Instant) -> Result<()> {
        let mut kick = Message::new("KICK").with_param(channel).with_param(nick);
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            kick.push_param(reason);
        }
        self.send_simple(kick, now)
    }

    /// Ban `nick` by user and host. The host is not known yet, so a WHO goes
    /// out first and the MODE +b follows its reply.
    pub fn ban(&mut self, channel: &str, nick: &str, now: Instant) -> Result<()> {
        let handler = Handler::reply(BanWho::new(nick, channel));
        self.command(now, |core| {
            core.send_message(&Message::new("WHO").with_param(nick), Priority::Normal, Some(handler), 0)?;
            Ok(())
        })
    }

    /// Send a command typed by the user. CTCP DCC is refused, an empty CTCP
    /// PING gets the current time as payload, and with `notify_owner` our
    /// own JOIN/PRIVMSG/NOTICE lines are reported back as events. Returns
    /// the number of wire lines.
    pub fn send_user_command(&mut self, message: Message, notify_owner: bool, now: Instant) -> Result<usize> {
        self.command(now, |core| {
            if let Some(info) = message.ctcp_info() {
                if info.kind().starts_with("DCC") {
                    return Err(SessionError::DccNotAllowed);
                }
                if info.is("PING") && info.param_count() == 0 {
                    if let Some(target) = message.param(0) {
                        let stamp = core.host.current_time().timestamp();
                        let ping = Message::ctcp(message.command(), target, format!("PING {stamp}"));
                        return core.send_lines(&ping, Priority::Normal, None, 0, notify_owner);
                    }
                }
            }

            let handler = DummyHandler::for_message(&message).map(Handler::reply);
            core.send_lines(&message, Priority::Normal, handler, 0, notify_owner)
        })
    }

    /// Track the comma separated `nicknames` under the owner's contact
    /// `id`. Works offline too; polling starts once online.
    pub fn add_contacts(&mut self, id: i32, nicknames: &str, now: Instant) {
        self.core.now = now;
        self.core.add_contacts(id, nicknames);
        self.settle();
    }

    pub fn change_contacts(&mut self, id: i32, nicknames: &str, now: Instant) {
        self.core.now = now;
        self.core.change_contacts(id, nicknames);
        self.settle();
    }

    pub fn remove_contacts(&mut self, id: i32, now: Instant) {
        self.core.now = now;
        self.core.remove_contacts(id);
        self.settle();
    }

    /// Offer a file to `nick`. With `listen_port` we are the listening side
    /// (the peer's address is looked up first); without one the peer is
    /// asked to listen. Returns the id of the new send.
    pub fn dcc_send(
        &mut self,
        nick: &str,
        path: &str,
        size: u64,
        listen_port: Option<u16>,
        now: Instant,
    ) -> Result<u32> {
        self.command(now, |core| core.offer_file(nick, path, size, listen_port))
    }

    /// Accept an offer announced by [`Event::DccSendRequest`]. A non-zero
    /// `resume_position` asks the sender to resume there. Passive offers
    /// need the port we listen on.
    pub fn dcc_accept(
        &mut self,
        port: u16,
        id: u32,
        resume_position: u64,
        listen_port: Option<u16>,
        now: Instant,
    ) -> Result<()> {
        self.command(now, |core| core.accept_offer(port, id, resume_position, listen_port))
    }

    /// Forget a negotiation once the owner is done with the transfer.
    pub fn dcc_close(&mut self, port: u16, id: u32) -> bool {
        self.core.dcc.remove_receive(port, id).is_some() || self.core.dcc.remove_send(port, id).is_some()
    }

    /// The owner resolved our external host name (see
    /// [`Event::ExternalAddress`]).
    pub fn set_external_ip(&mut self, ip: Ipv4Addr) {
        self.core.local.set_external_ip(ip);
    }
}

use anyhow::Result;
use ircsession::config::nickname::generate_nickname;
use ircsession::config::{self, AppConfig, ServerConfig};
use ircsession::engine::{ChatTarget, Event, Session, SessionState, SystemHost};
use ircsession::irc::commands::{ServerAddress, UserCommand, HELP};
use ircsession::irc::Message;
use ircsession::logging::{self, Direction, TrafficLogger};
use ircsession::transport::{TcpTransport, TransportEvent};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Contact list id for the server's configured notify list.
const CONFIG_CONTACTS: i32 = 0;
/// Contact list id for nicks added with `/notify`.
const USER_CONTACTS: i32 = 1;
const RECONNECT_DELAY: Duration = Duration::from_secs(15);

enum AppEvent {
    Transport(TransportEvent),
    Tick,
    Input(String),
    InputClosed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_config_from(&PathBuf::from(path))?,
        None => config::load_config()?,
    };
    logging::init_tracing(&cfg.logging.level);

    if let Err(e) = run(cfg).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cfg: AppConfig) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (transport_tx, mut transport_rx) = mpsc::unbounded_channel::<TransportEvent>();

    let transport = TcpTransport::new(transport_tx);
    let generation = transport.generation();
    let host = SystemHost::new(cfg.connection.charset.clone());
    let session = Session::new(cfg.session_config(), Box::new(transport), Box::new(host));

    // Forward transport reports into the main loop
    let fwd_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = transport_rx.recv().await {
            if fwd_tx.send(AppEvent::Transport(event)).is_err() {
                break;
            }
        }
    });

    // Spawn stdin task
    let input_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if input_tx.send(AppEvent::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    let _ = input_tx.send(AppEvent::InputClosed);
                    break;
                }
            }
        }
    });

    // Spawn tick task, drives the flood scheduler and handler timeouts
    let tick_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    let mut driver = Driver {
        traffic: TrafficLogger::new(&cfg.logging),
        cfg,
        session,
        generation,
        server: None,
        target: None,
        notify: Vec::new(),
        reconnect_at: None,
        quitting: false,
    };

    match driver.cfg.servers.iter().find(|s| s.auto_connect).cloned() {
        Some(server) => driver.connect(server),
        None => {
            println!("Not connected. Configured servers:");
            for srv in &driver.cfg.servers {
                println!("  {}  ({}:{})", srv.name, srv.host, srv.port);
            }
            println!("Connect with /server <name|host[:port]>, /help for commands.");
        }
    }
    driver.flush().await;

    while let Some(event) = event_rx.recv().await {
        let now = Instant::now();
        match event {
            AppEvent::Transport(event) => driver.on_transport(event, now),
            AppEvent::Tick => driver.on_tick(now),
            AppEvent::Input(line) => driver.on_input(&line, now),
            AppEvent::InputClosed => {
                driver.quit(None, now);
            }
        }
        driver.flush().await;
        if driver.quitting {
            break;
        }
    }

    // Give the connection task a moment to write QUIT
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok(())
}

struct Driver {
    cfg: AppConfig,
    session: Session,
    generation: Arc<AtomicU64>,
    server: Option<ServerConfig>,
    /// Where plain input lines go.
    target: Option<String>,
    notify: Vec<String>,
    reconnect_at: Option<Instant>,
    traffic: TrafficLogger,
    quitting: bool,
}

impl Driver {
    fn connect(&mut self, server: ServerConfig) {
        let now = Instant::now();
        if self.session.state() != SessionState::Offline {
            self.session.terminate(server.quit_message.as_deref(), true, now);
        }
        println!("Connecting to {}:{}...", server.host, server.port);
        self.reconnect_at = None;
        if let Err(e) = self.session.initiate(server.connect_params(), now) {
            println!("Connection failed: {}", e);
        }
        self.server = Some(server);
    }

    fn on_transport(&mut self, event: TransportEvent, now: Instant) {
        if event.generation() != self.generation.load(Ordering::SeqCst) {
            debug!(generation = event.generation(), "dropping report from an old connection");
            return;
        }
        match event {
            TransportEvent::Ready { local_ip, .. } => {
                if let Err(e) = self.session.on_transport_ready(local_ip, now) {
                    warn!(%e, "registration failed");
                }
            }
            TransportEvent::Data { bytes, .. } => self.session.on_data(&bytes, now),
            TransportEvent::Closed { error, .. } => self.session.on_transport_closed(error, now),
        }
    }

    fn on_tick(&mut self, now: Instant) {
        self.session.tick(now);
        if self.reconnect_at.is_some_and(|at| now >= at) {
            if let Some(server) = self.server.clone() {
                self.connect(server);
            }
        }
    }

    fn quit(&mut self, message: Option<&str>, now: Instant) {
        let default = self.server.as_ref().and_then(|s| s.quit_message.clone());
        self.session.terminate(message.or(default.as_deref()), true, now);
        self.quitting = true;
    }

    fn on_input(&mut self, line: &str, now: Instant) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        if !line.starts_with('/') {
            let Some(target) = self.target.clone() else {
                println!("No target; /join a channel or /msg someone first.");
                return;
            };
            let result = self.say(&target, line, now);
            report(result);
            return;
        }
        let Some(command) = UserCommand::parse(line) else {
            println!("Unknown command. /help for a list.");
            return;
        };
        self.run_command(command, now);
    }

    fn say(&mut self, target: &str, text: &str, now: Instant) -> ircsession::Result<()> {
        if self.session.core().support().is_channel(target) {
            self.session.send_channel_message(target, text, now)
        } else {
            self.session.send_private_message(target, text, now)
        }
    }

    fn channel_or_target(&self, channel: Option<String>) -> Option<String> {
        channel.or_else(|| {
            self.target
                .clone()
                .filter(|t| self.session.core().support().is_channel(t))
        })
    }

    fn user_command(&mut self, message: Message, now: Instant) -> ircsession::Result<()> {
        self.session.send_user_command(message, true, now).map(|_| ())
    }

    fn run_command(&mut self, command: UserCommand, now: Instant) {
        let result = match command {
            UserCommand::Help => {
                println!("{HELP}");
                Ok(())
            }
            UserCommand::ServerList => {
                for srv in &self.cfg.servers {
                    println!("  {}  ({}:{}{})", srv.name, srv.host, srv.port, if srv.tls { " tls" } else { "" });
                }
                Ok(())
            }
            UserCommand::Connect { name, address } => {
                let server = self.cfg.server(&name).cloned().unwrap_or_else(|| ad_hoc_server(&self.cfg, address));
                self.connect(server);
                Ok(())
            }
            UserCommand::Disconnect => {
                let reason = self.server.as_ref().and_then(|s| s.quit_message.clone());
                self.session.terminate(reason.as_deref(), true, now);
                self.reconnect_at = None;
                println!("Disconnected.");
                Ok(())
            }
            UserCommand::Quit { message } => {
                self.quit(message.as_deref(), now);
                Ok(())
            }
            UserCommand::Join { channel, password } => {
                self.session.join_channel(&channel, password.as_deref(), now)
            }
            UserCommand::Part { channel } => match self.channel_or_target(channel) {
                Some(channel) => self.session.leave_channel(&channel, now),
                None => no_channel(),
            },
            UserCommand::Nick { nick } => self.session.set_nick(&nick, now),
            UserCommand::Msg { target, text } => {
                self.target = Some(target.clone());
                if text.is_empty() {
                    Ok(())
                } else {
                    self.say(&target, &text, now)
                }
            }
            UserCommand::Me { text } => match self.target.clone() {
                Some(target) => self.session.send_action(&target, &text, now),
                None => {
                    println!("No target.");
                    Ok(())
                }
            },
            UserCommand::Notice { target, text } => {
                self.user_command(Message::new("NOTICE").with_param(target).with_param(text), now)
            }
            UserCommand::Kick { channel, user, reason } => match self.channel_or_target(channel) {
                Some(channel) => self.session.kick(&channel, &user, reason.as_deref(), now),
                None => no_channel(),
            },
            UserCommand::Ban { channel, nick } => match self.channel_or_target(channel) {
                Some(channel) => self.session.ban(&channel, &nick, now),
                None => no_channel(),
            },
            UserCommand::Mode { target, modes } => {
                let mut message = Message::new("MODE").with_param(target);
                for part in modes.split_whitespace() {
                    message.push_param(part);
                }
                self.user_command(message, now)
            }
            UserCommand::Op { channel, nick, grant } => match self.channel_or_target(channel) {
                Some(channel) => self.session.op(&channel, &nick, grant, now),
                None => no_channel(),
            },
            UserCommand::Voice { channel, nick, grant } => match self.channel_or_target(channel) {
                Some(channel) => self.session.voice(&channel, &nick, grant, now),
                None => no_channel(),
            },
            UserCommand::Topic { text } => match self.channel_or_target(None) {
                Some(channel) => self.session.set_topic(&channel, &text, now),
                None => no_channel(),
            },
            UserCommand::Whois { nick } => self.session.whois(&nick, now),
            UserCommand::Who { target } => self.user_command(Message::new("WHO").with_param(target), now),
            UserCommand::Away { message } => self.session.set_away(message.as_deref(), now),
            UserCommand::Raw { command } => match Message::parse(&command) {
                Ok(message) => self.user_command(message, now),
                Err(e) => Err(e.into()),
            },
            UserCommand::List => self.session.list_channels(now),
            UserCommand::Notify { nicks: None } => {
                for contact in self.session.core().contacts().iter() {
                    let status = if contact.is_online() { "online" } else { "offline" };
                    println!("  {} {} {}", contact.nick(), status, contact.away_message());
                }
                Ok(())
            }
            UserCommand::Notify { nicks: Some(nicks) } => {
                for nick in nicks.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    if !self.notify.iter().any(|n| n.eq_ignore_ascii_case(nick)) {
                        self.notify.push(nick.to_string());
                    }
                }
                self.session.change_contacts(USER_CONTACTS, &self.notify.join(","), now);
                Ok(())
            }
            UserCommand::Unnotify { nick } => {
                self.notify.retain(|n| !n.eq_ignore_ascii_case(&nick));
                self.session.change_contacts(USER_CONTACTS, &self.notify.join(","), now);
                Ok(())
            }
            UserCommand::Ctcp { target, command } => {
                let message = Message::ctcp("PRIVMSG", &target, command.to_uppercase());
                self.user_command(message, now)
            }
            UserCommand::DccSend { nick, path } => match std::fs::metadata(&path) {
                Ok(meta) => self
                    .session
                    .dcc_send(&nick, &path, meta.len(), None, now)
                    .map(|id| println!("Offered {} to {} (id {})", path, nick, id)),
                Err(e) => {
                    println!("Cannot read {}: {}", path, e);
                    Ok(())
                }
            },
            UserCommand::DccGet { port, id, resume } => {
                self.session.dcc_accept(port, id, resume.unwrap_or(0), None, now)
            }
            UserCommand::DccClose { port, id } => {
                if !self.session.dcc_close(port, id) {
                    println!("No DCC session {}/{}", port, id);
                }
                Ok(())
            }
            UserCommand::DccList => {
                let dcc = self.session.core().dcc_sessions();
                for r in dcc.receives() {
                    println!("  <- {} {} ({} bytes) port {} id {}", r.from, r.filename, r.size, r.port, r.id);
                }
                for s in dcc.sends() {
                    println!("  -> {} {} ({} bytes) port {} id {}", s.to, s.filename, s.size, s.port, s.id);
                }
                Ok(())
            }
        };
        report(result);
    }

    /// Handle everything the session queued since the last call.
    async fn flush(&mut self) {
        loop {
            let events = self.session.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.on_event(event).await;
            }
        }
    }

    async fn on_event(&mut self, event: Event) {
        let now = Instant::now();
        let server_host = self.server.as_ref().map(|s| s.host.clone()).unwrap_or_default();
        match event {
            Event::RawSent { line } => self.traffic.log_line(&server_host, Direction::Sent, &line),
            Event::RawReceived { line } => self.traffic.log_line(&server_host, Direction::Received, &line),
            Event::ProtocolReady => {
                info!(server = %server_host, nick = %self.session.nick(), "registered");
                println!("*** Connected as {}", self.session.nick());
                if let Some(server) = self.server.clone() {
                    if !server.notify.is_empty() {
                        self.session.add_contacts(CONFIG_CONTACTS, &server.notify.join(","), now);
                    }
                    for channel in &server.channels {
                        report(self.session.join_channel(channel, None, now));
                    }
                }
                if !self.notify.is_empty() {
                    self.session.add_contacts(USER_CONTACTS, &self.notify.join(","), now);
                }
            }
            Event::ConnectionLost { retry } => {
                println!("*** Connection lost");
                if retry && self.server.is_some() {
                    println!("*** Reconnecting in {}s", RECONNECT_DELAY.as_secs());
                    self.reconnect_at = Some(now + RECONNECT_DELAY);
                }
            }
            Event::ExternalAddress { host: Some(host) } => match resolve_ipv4(&host).await {
                Some(ip) => {
                    debug!(%host, %ip, "external address");
                    self.session.set_external_ip(ip);
                }
                None => warn!(%host, "cannot resolve external address"),
            },
            Event::ChannelJoined { ref target, nick: None, .. } => {
                self.target = Some(target.channel.clone());
                println!("{}", describe(&event));
            }
            Event::DccSendRequest { ref from, ref filename, port, id, .. } => {
                println!("{}", describe(&event));
                println!("*** /dcc get {} {} to accept {} from {}", port, id, filename, from);
            }
            other => {
                let text = describe(&other);
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
        }
    }
}

fn report(result: ircsession::Result<()>) {
    if let Err(e) = result {
        println!("!!! {}", e);
    }
}

fn no_channel() -> ircsession::Result<()> {
    println!("Not in a channel.");
    Ok(())
}

fn ad_hoc_server(cfg: &AppConfig, address: ServerAddress) -> ServerConfig {
    let ServerAddress { host, port, tls } = address;
    let nickname = cfg
        .servers
        .first()
        .map(|s| s.nickname.clone())
        .unwrap_or_else(generate_nickname);
    ServerConfig {
        name: host.clone(),
        host,
        port,
        tls,
        nickname,
        username: None,
        realname: None,
        password: None,
        channels: Vec::new(),
        auto_connect: false,
        quit_message: None,
        notify: Vec::new(),
    }
}

async fn resolve_ipv4(host: &str) -> Option<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Some(ip);
    }
    let mut addrs = tokio::net::lookup_host((host, 0)).await.ok()?;
    addrs.find_map(|addr| match addr.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    })
}

fn room(target: &ChatTarget) -> &str {
    &target.channel
}

/// One display line per event. Empty for events that are not shown.
fn describe(event: &Event) -> String {
    match event {
        Event::NicknameChanged { old, new } => format!("*** {} is now known as {}", old, new),
        Event::NicknameInUse { nick } => format!("!!! Nickname {} is already in use", nick),
        Event::ServerMessage { text } | Event::ServerInformation { text } => format!("-!- {}", text),
        Event::ChannelJoined { target, nick, .. } => {
            format!("*** {} joined {}", nick.as_deref().unwrap_or("You"), room(target))
        }
        Event::ChannelLeft { target, nick, reason } => format!(
            "*** {} left {}{}",
            nick.as_deref().unwrap_or("You"),
            room(target),
            reason.as_ref().map(|r| format!(" ({})", r)).unwrap_or_default()
        ),
        Event::Quit { nick, reason } => format!("*** {} quit ({})", nick, reason.as_deref().unwrap_or("")),
        Event::Kicked { target, nick, by, reason } => format!(
            "*** {} was kicked from {} by {} ({})",
            nick.as_deref().unwrap_or("You"),
            room(target),
            by,
            reason.as_deref().unwrap_or("")
        ),
        Event::TopicChanged { target, by, topic } => match by {
            Some(by) => format!("*** {} set the topic of {}: {}", by, room(target), topic),
            None => format!("*** Topic for {}: {}", room(target), topic),
        },
        Event::Invite { from, target } => format!("*** {} invites you to {}", from, room(target)),
        Event::ChannelModeChanged { target, by, change } => format!(
            "*** mode {} {}{}{}{}",
            room(target),
            if change.set { '+' } else { '-' },
            change.mode,
            change.parameter.as_ref().map(|p| format!(" {}", p)).unwrap_or_default(),
            by.as_ref().map(|b| format!(" by {}", b)).unwrap_or_default()
        ),
        Event::ChannelMessage { target, from, text, action } => {
            let from = from.as_deref().unwrap_or(">");
            if *action {
                format!("[{}] * {} {}", room(target), from, text)
            } else {
                format!("[{}] <{}> {}", room(target), from, text)
            }
        }
        Event::PrivateMessage { peer, text, action, outgoing } => {
            let arrow = if *outgoing { "->" } else { "<-" };
            if *action {
                format!("{} {} * {}", arrow, peer, text)
            } else {
                format!("{} {}: {}", arrow, peer, text)
            }
        }
        Event::ChannelUser { .. } => String::new(),
        Event::ChannelUsersDone { target } => format!("*** End of names for {}", room(target)),
        Event::ChannelPasswordRequired { target } => format!("!!! {} needs a key: /join {} <key>", room(target), room(target)),
        Event::ChannelListEntry { target, users, topic } => format!("  {:<20} {:>5}  {}", room(target), users, topic),
        Event::ChannelListDone => "*** End of channel list".to_string(),
        Event::NickAway { nick, message } => format!("*** {} is away: {}", nick, message),
        Event::WhoisReply(info) => {
            let mut lines = vec![format!("*** {} ({}@{}): {}", info.nick, info.user, info.host, info.real_name)];
            if !info.channels.is_empty() {
                lines.push(format!("***   channels: {}", info.channels));
            }
            if !info.server.is_empty() {
                lines.push(format!("***   server: {} {}", info.server, info.server_info));
            }
            if !info.away_message.is_empty() {
                lines.push(format!("***   away: {}", info.away_message));
            }
            if let Some(idle) = info.idle_secs {
                lines.push(format!("***   idle: {}s", idle));
            }
            lines.join("\n")
        }
        Event::InitialPresence { nick } => format!("*** {} is online", nick),
        Event::PresenceOffline { nick } => format!("*** {} went offline", nick),
        Event::PresenceUpdate { nick, away_message } if away_message.is_empty() => format!("*** {} is back", nick),
        Event::PresenceUpdate { nick, away_message } => format!("*** {} is away: {}", nick, away_message),
        Event::DccSendRequest { from, filename, size, .. } => {
            format!("*** {} offers {} ({} bytes)", from, filename, size)
        }
        Event::DccReceiveReady { port, id, position } => {
            format!("*** DCC {}/{} ready from byte {}", port, id, position)
        }
        Event::DccReceiveFailed { from, filename, .. } => format!("!!! DCC receive of {} from {} failed", filename, from),
        Event::DccResumeRequested { port, id, position } => {
            format!("*** DCC {}/{} resume requested at byte {}", port, id, position)
        }
        Event::DccResumeAccepted { port, id, position } => {
            format!("*** DCC {}/{} resuming at byte {}", port, id, position)
        }
        Event::DccPassiveSendReady { id, address, port } => {
            format!("*** DCC send {}: peer listening on {}:{}", id, address, port)
        }
        Event::DccSendFailed { to, filename, .. } => format!("!!! DCC send of {} to {} failed", filename, to),
        Event::ProtocolReady
        | Event::ConnectionLost { .. }
        | Event::RawReceived { .. }
        | Event::RawSent { .. }
        | Event::ExternalAddress { .. } => String::new(),
    }
}

//! DCC negotiation bookkeeping.
//!
//! Only the control exchange over CTCP lives here: offers we received,
//! files we offered, resume positions and the address we advertise. Moving
//! the file bytes is left to the owner, which learns what to do from the
//! `Dcc*` events.

use crate::engine::event::Event;
use crate::engine::handler::Handler;
use crate::engine::handlers::{DccResumeWait, DccWho, PassiveSendWait};
use crate::engine::scheduler::Priority;
use crate::engine::session::Core;
use crate::error::{Result, SessionError};
use crate::irc::{CtcpInfo, Message};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use tracing::{debug, warn};

/// Check if an IP address is private/loopback. Such addresses are useless
/// to a peer on another network.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

/// Strip path components and control characters from a received filename.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    // Backslash is a valid character on Unix, so split on it by hand.
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    let sanitized: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\' && *c != ':')
        .collect();

    // Leading dots would make hidden files or `..`.
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        return None;
    }

    let mut end = sanitized.len().min(255);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    Some(sanitized[..end].to_string())
}

/// The name announced in a DCC SEND: file part only, spaces replaced with
/// underscores the way mIRC does it.
pub fn announced_filename(path: &str) -> String {
    sanitize_filename(path)
        .unwrap_or_else(|| "file".to_string())
        .replace(' ', "_")
}

/// `a.b.c.d` as the 32-bit integer DCC uses on the wire.
pub fn long_ip(ip: Ipv4Addr) -> u32 {
    u32::from(ip)
}

/// Addresses we know about ourselves, used to pick the one to advertise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAddress {
    external_host: Option<String>,
    external_ip: Option<Ipv4Addr>,
    local_ip: Option<Ipv4Addr>,
}

impl LocalAddress {
    /// Host from our USERHOST reply. A literal IPv4 host doubles as the
    /// external address; anything else needs [`set_external_ip`](Self::set_external_ip)
    /// from the owner after resolving it.
    pub fn set_external_host(&mut self, host: Option<String>) {
        self.external_ip = host.as_deref().and_then(|h| h.parse().ok());
        self.external_host = host;
    }

    pub fn set_external_ip(&mut self, ip: Ipv4Addr) {
        self.external_ip = Some(ip);
    }

    pub fn set_local_ip(&mut self, ip: Ipv4Addr) {
        self.local_ip = Some(ip);
    }

    pub fn external_host(&self) -> Option<&str> {
        self.external_host.as_deref()
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.local_ip
    }

    /// Address to advertise to a peer seen at `receiver_host`: the local one
    /// when the peer sits behind the same address as us or when the external
    /// one is not public, the external one otherwise. Zero when unknown.
    pub fn long_ip_for(&self, receiver_host: &str) -> u32 {
        let local = self.local_ip.map(long_ip).unwrap_or(0);
        let Some(external) = self.external_ip else {
            return local;
        };

        let same_network = self
            .external_host
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case(receiver_host))
            || external.to_string() == receiver_host;
        if same_network || is_private_ip(&IpAddr::V4(external)) {
            local
        } else {
            long_ip(external)
        }
    }
}

/// A `DCC SEND` offer received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccSendOffer {
    pub filename: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub size: u64,
    /// Present on passive offers and on the answer to ours.
    pub id: u32,
}

impl DccSendOffer {
    /// `DCC SEND <file> <longip> <port> <size> [id]`. The filename may be
    /// quoted and is sanitized.
    pub fn parse(ctcp: &CtcpInfo) -> Option<Self> {
        if !ctcp.is("DCC") || !ctcp.param(0)?.eq_ignore_ascii_case("SEND") || ctcp.param_count() < 5 {
            return None;
        }

        let filename = sanitize_filename(ctcp.param(1)?)?;
        let address = Ipv4Addr::from(ctcp.param(2)?.parse::<u32>().ok()?);
        let port = ctcp.param(3)?.parse().ok()?;
        let size = ctcp.param(4)?.parse().ok()?;
        let id = ctcp.param(5).and_then(|id| id.parse().ok()).unwrap_or(0);

        Some(Self {
            filename,
            address,
            port,
            size,
            id,
        })
    }
}

/// `DCC RESUME` / `DCC ACCEPT "<file>" <port> <position> [id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccResume {
    pub filename: String,
    pub port: u16,
    pub position: u64,
    pub id: u32,
}

impl DccResume {
    pub fn parse(ctcp: &CtcpInfo, kind: &str) -> Option<Self> {
        if !ctcp.is("DCC") || !ctcp.param(0)?.eq_ignore_ascii_case(kind) || ctcp.param_count() < 4 {
            return None;
        }
        Some(Self {
            filename: ctcp.param(1)?.to_string(),
            port: ctcp.param(2)?.parse().ok()?,
            position: ctcp.param(3)?.parse().ok()?,
            id: ctcp.param(4).and_then(|id| id.parse().ok()).unwrap_or(0),
        })
    }
}

pub fn send_message(nick: &str, filename: &str, long_ip: u32, port: u16, size: u64, id: u32) -> Message {
    let mut payload = format!("DCC SEND {filename} {long_ip} {port} {size}");
    if id != 0 {
        payload.push_str(&format!(" {id}"));
    }
    Message::ctcp("PRIVMSG", nick, payload)
}

pub fn accept_message(nick: &str, filename: &str, port: u16, position: u64, id: Option<u32>) -> Message {
    position_message("ACCEPT", nick, filename, port, position, id)
}

pub fn resume_message(nick: &str, filename: &str, port: u16, position: u64, id: Option<u32>) -> Message {
    position_message("RESUME", nick, filename, port, position, id)
}

fn position_message(kind: &str, nick: &str, filename: &str, port: u16, position: u64, id: Option<u32>) -> Message {
    let mut payload = format!("DCC {kind} \"{filename}\" {port} {position}");
    if let Some(id) = id {
        payload.push_str(&format!(" {id}"));
    }
    Message::ctcp("PRIVMSG", nick, payload)
}

/// A file offered to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccReceive {
    pub from: String,
    pub filename: String,
    pub size: u64,
    pub address: Ipv4Addr,
    /// Zero for a passive offer, where we are the listening side.
    pub port: u16,
    pub id: u32,
    pub listen_port: Option<u16>,
    pub resume_position: u64,
    pub accepted: bool,
}

impl DccReceive {
    pub fn is_passive(&self) -> bool {
        self.port == 0
    }
}

/// A file we offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccSend {
    pub to: String,
    pub filename: String,
    pub size: u64,
    /// Our listening port, zero for a passive send.
    pub port: u16,
    pub id: u32,
    pub resume_position: u64,
}

impl DccSend {
    pub fn is_passive(&self) -> bool {
        self.port == 0
    }
}

/// Open negotiations, looked up by port when there is one and by id
/// otherwise.
#[derive(Debug, Default)]
pub struct DccSessions {
    receives: Vec<DccReceive>,
    sends: Vec<DccSend>,
    last_id: u32,
}

fn matches(port: u16, id: u32, want_port: u16, want_id: u32) -> bool {
    if want_port != 0 {
        port == want_port && (want_id == 0 || id == want_id || id == 0)
    } else {
        port == 0 && id == want_id
    }
}

impl DccSessions {
    pub fn next_id(&mut self) -> u32 {
        self.last_id = self.last_id.wrapping_add(1).max(1);
        self.last_id
    }

    /// Track a new offer. An older offer on the same port is returned so
    /// the caller can report it as failed.
    pub fn add_receive(&mut self, receive: DccReceive) -> Option<DccReceive> {
        let replaced = if receive.port != 0 {
            self.remove_receive(receive.port, 0)
        } else {
            None
        };
        debug!(from = %receive.from, file = %receive.filename, port = receive.port, id = receive.id, "tracking DCC offer");
        self.receives.push(receive);
        replaced
    }

    pub fn receive(&self, port: u16, id: u32) -> Option<&DccReceive> {
        self.receives.iter().find(|r| matches(r.port, r.id, port, id))
    }

    pub fn receive_mut(&mut self, port: u16, id: u32) -> Option<&mut DccReceive> {
        self.receives.iter_mut().find(|r| matches(r.port, r.id, port, id))
    }

    pub fn remove_receive(&mut self, port: u16, id: u32) -> Option<DccReceive> {
        let index = self.receives.iter().position(|r| matches(r.port, r.id, port, id))?;
        Some(self.receives.remove(index))
    }

    pub fn add_send(&mut self, send: DccSend) {
        debug!(to = %send.to, file = %send.filename, port = send.port, id = send.id, "tracking DCC send");
        self.sends.push(send);
    }

    pub fn send(&self, port: u16, id: u32) -> Option<&DccSend> {
        self.sends.iter().find(|s| matches(s.port, s.id, port, id))
    }

    pub fn send_mut(&mut self, port: u16, id: u32) -> Option<&mut DccSend> {
        self.sends.iter_mut().find(|s| matches(s.port, s.id, port, id))
    }

    pub fn remove_send(&mut self, port: u16, id: u32) -> Option<DccSend> {
        let index = self.sends.iter().position(|s| matches(s.port, s.id, port, id))?;
        Some(self.sends.remove(index))
    }

    pub fn receives(&self) -> impl Iterator<Item = &DccReceive> {
        self.receives.iter()
    }

    pub fn sends(&self) -> impl Iterator<Item = &DccSend> {
        self.sends.iter()
    }

    pub fn len(&self) -> usize {
        self.receives.len() + self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.receives.clear();
        self.sends.clear();
    }
}

impl Core {
    /// A peer sent `DCC SEND`. Offers failing the size or address checks
    /// are dropped with a warning.
    pub(crate) fn receive_offer(&mut self, from: &str, offer: DccSendOffer) {
        let limits = &self.config.dcc;
        if offer.size > limits.max_file_size {
            warn!(from, file = %offer.filename, size = offer.size, "DCC offer exceeds size limit");
            return;
        }
        if limits.reject_private_ips && offer.port != 0 && is_private_ip(&IpAddr::V4(offer.address)) {
            warn!(from, address = %offer.address, "DCC offer from private address rejected");
            return;
        }

        let receive = DccReceive {
            from: from.to_string(),
            filename: offer.filename.clone(),
            size: offer.size,
            address: offer.address,
            port: offer.port,
            id: offer.id,
            listen_port: None,
            resume_position: 0,
            accepted: false,
        };
        if let Some(old) = self.dcc.add_receive(receive) {
            self.emit(Event::DccReceiveFailed {
                port: old.port,
                id: old.id,
                from: old.from,
                filename: old.filename,
            });
        }
        self.emit(Event::DccSendRequest {
            from: from.to_string(),
            filename: offer.filename,
            size: offer.size,
            address: (!offer.address.is_unspecified()).then_some(offer.address),
            port: offer.port,
            id: offer.id,
        });
    }

    /// The receiver of one of our files wants it from `position` on.
    pub(crate) fn resume_requested(&mut self, resume: DccResume) {
        if resume.position == 0 {
            return;
        }
        let Some(send) = self.dcc.send_mut(resume.port, resume.id) else {
            debug!(port = resume.port, id = resume.id, "resume request for unknown send");
            return;
        };
        send.resume_position = resume.position;
        let (to, port, id) = (send.to.clone(), send.port, send.id);

        let accept = accept_message(&to, &resume.filename, port, resume.position, (port == 0).then_some(id));
        self.send_logged(&accept, Priority::Normal, None, 0);
        self.emit(Event::DccResumeRequested {
            port,
            id,
            position: resume.position,
        });
    }

    /// The sender agreed to our resume request.
    pub(crate) fn resume_accepted(&mut self, port: u16, id: u32, position: u64) {
        let Some(receive) = self.dcc.receive_mut(port, id) else {
            return;
        };
        receive.resume_position = position;
        let passive = receive.is_passive();
        let from = receive.from.clone();

        self.emit(Event::DccResumeAccepted { port, id, position });
        if passive {
            let who = Message::new("WHO").with_param(&from);
            let handler = Handler::reply(DccWho::for_receive(&from, port, id));
            self.send_logged(&who, Priority::Normal, Some(handler), 0);
        }
    }

    pub(crate) fn fail_receive(&mut self, port: u16, id: u32) {
        if let Some(receive) = self.dcc.remove_receive(port, id) {
            self.emit(Event::DccReceiveFailed {
                port: receive.port,
                id: receive.id,
                from: receive.from,
                filename: receive.filename,
            });
        }
    }

    pub(crate) fn fail_send(&mut self, port: u16, id: u32) {
        if let Some(send) = self.dcc.remove_send(port, id) {
            self.emit(Event::DccSendFailed {
                port: send.port,
                id: send.id,
                to: send.to,
                filename: send.filename,
            });
        }
    }

    /// Our offer for an active send, once the receiver's host is known.
    pub(crate) fn announce_send(&mut self, port: u16, id: u32, receiver_host: &str) {
        let Some(send) = self.dcc.send(port, id) else {
            return;
        };
        let offer = send_message(
            &send.to,
            &send.filename,
            self.local.long_ip_for(receiver_host),
            send.port,
            send.size,
            0,
        );
        self.send_logged(&offer, Priority::Normal, None, 0);
    }

    /// Tell the sender of a passive offer where we listen.
    pub(crate) fn announce_passive_receive(&mut self, port: u16, id: u32, sender_host: &str) {
        let Some(receive) = self.dcc.receive(port, id) else {
            return;
        };
        let Some(listen_port) = receive.listen_port else {
            warn!(id, "passive DCC receive without a listening port");
            return;
        };
        let answer = send_message(
            &receive.from,
            &receive.filename,
            self.local.long_ip_for(sender_host),
            listen_port,
            receive.size,
            receive.id,
        );
        self.send_logged(&answer, Priority::Normal, None, 0);
    }

    pub(crate) fn offer_file(&mut self, nick: &str, path: &str, size: u64, listen_port: Option<u16>) -> Result<u32> {
        if nick.is_empty() {
            return Err(SessionError::InvalidDcc("no recipient".to_string()));
        }
        if listen_port == Some(0) {
            return Err(SessionError::InvalidDcc("listening port must not be zero".to_string()));
        }

        let filename = announced_filename(path);
        let id = self.dcc.next_id();
        let port = listen_port.unwrap_or(0);
        self.dcc.add_send(DccSend {
            to: nick.to_string(),
            filename: filename.clone(),
            size,
            port,
            id,
            resume_position: 0,
        });

        let sent = if port != 0 {
            let who = Message::new("WHO").with_param(nick);
            let handler = Handler::reply(DccWho::for_send(nick, port, id));
            self.send_message(&who, Priority::Normal, Some(handler), 0)
        } else {
            let offer = send_message(nick, &filename, self.local.long_ip_for(""), 0, size, id);
            let handler = PassiveSendWait::handler(id, self.config.dcc.passive_timeout_secs);
            self.send_message(&offer, Priority::Normal, Some(handler), 0)
        };
        if let Err(err) = sent {
            self.dcc.remove_send(port, id);
            return Err(err);
        }
        Ok(id)
    }

    pub(crate) fn accept_offer(
        &mut self,
        port: u16,
        id: u32,
        resume_position: u64,
        listen_port: Option<u16>,
    ) -> Result<()> {
        let resume_timeout = self.config.dcc.resume_timeout_secs;
        let receive = self
            .dcc
            .receive_mut(port, id)
            .ok_or(SessionError::UnknownDcc { port, id })?;
        if receive.is_passive() {
            match listen_port {
                Some(listen) if listen != 0 => receive.listen_port = Some(listen),
                _ => {
                    return Err(SessionError::InvalidDcc(
                        "passive offer needs a listening port".to_string(),
                    ))
                }
            }
        }
        receive.accepted = true;
        receive.resume_position = resume_position;
        let from = receive.from.clone();
        let filename = receive.filename.clone();
        let passive = receive.is_passive();
        let id = receive.id;

        if resume_position > 0 {
            let resume = resume_message(&from, &filename, port, resume_position, passive.then_some(id));
            let handler = DccResumeWait::handler(port, id, resume_timeout);
            self.send_message(&resume, Priority::Normal, Some(handler), 0)?;
        } else if passive {
            let who = Message::new("WHO").with_param(&from);
            let handler = Handler::reply(DccWho::for_receive(&from, port, id));
            self.send_message(&who, Priority::Normal, Some(handler), 0)?;
        } else {
            self.emit(Event::DccReceiveReady {
                port,
                id,
                position: 0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctcp(payload: &str) -> CtcpInfo {
        CtcpInfo::parse(payload)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("hello.txt"), Some("hello.txt".into()));
        assert_eq!(sanitize_filename("../../../etc/passwd"), Some("passwd".into()));
        assert_eq!(sanitize_filename("..\\..\\windows\\system32"), Some("system32".into()));
        assert_eq!(sanitize_filename(".hidden"), Some("hidden".into()));
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_announced_filename_replaces_spaces() {
        assert_eq!(announced_filename("/home/me/my holiday.jpg"), "my_holiday.jpg");
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_ip(&"10.0.0.1".parse().unwrap()));
        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_parse_send_offer() {
        let offer = DccSendOffer::parse(&ctcp("DCC SEND \"my file.txt\" 3232235777 5000 1234")).unwrap();
        assert_eq!(offer.filename, "my file.txt");
        assert_eq!(offer.address, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(offer.port, 5000);
        assert_eq!(offer.size, 1234);
        assert_eq!(offer.id, 0);

        let passive = DccSendOffer::parse(&ctcp("DCC SEND a.bin 16909060 0 10 7")).unwrap();
        assert_eq!(passive.port, 0);
        assert_eq!(passive.id, 7);

        assert!(DccSendOffer::parse(&ctcp("DCC SEND a.bin 1 2")).is_none());
        assert!(DccSendOffer::parse(&ctcp("DCC CHAT chat 1 2 3")).is_none());
    }

    #[test]
    fn test_parse_resume() {
        let resume = DccResume::parse(&ctcp("DCC RESUME \"a b.txt\" 5000 1024"), "RESUME").unwrap();
        assert_eq!(resume.filename, "a b.txt");
        assert_eq!(resume.port, 5000);
        assert_eq!(resume.position, 1024);
        assert!(DccResume::parse(&ctcp("DCC RESUME file 5000 1024"), "ACCEPT").is_none());
    }

    #[test]
    fn test_message_construction() {
        let send = send_message("bob", "a.txt", 16909060, 5000, 42, 0);
        assert_eq!(send.to_line(), "PRIVMSG bob :\u{1}DCC SEND a.txt 16909060 5000 42\u{1}");

        let passive = send_message("bob", "a.txt", 16909060, 0, 42, 3);
        assert!(passive.to_line().ends_with("0 42 3\u{1}"));

        let accept = accept_message("bob", "a.txt", 0, 100, Some(3));
        assert_eq!(accept.params()[1], "DCC ACCEPT \"a.txt\" 0 100 3");
    }

    #[test]
    fn test_long_ip_selection() {
        let mut local = LocalAddress::default();
        assert_eq!(local.long_ip_for("peer.example.org"), 0);

        local.set_local_ip(Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(local.long_ip_for("peer.example.org"), long_ip(Ipv4Addr::new(192, 168, 0, 2)));

        local.set_external_host(Some("1.2.3.4".to_string()));
        assert_eq!(local.long_ip_for("peer.example.org"), 0x0102_0304);
        // Same public address as ours: the peer is on our LAN.
        assert_eq!(local.long_ip_for("1.2.3.4"), long_ip(Ipv4Addr::new(192, 168, 0, 2)));

        local.set_external_host(Some("10.1.1.1".to_string()));
        assert_eq!(local.long_ip_for("peer.example.org"), long_ip(Ipv4Addr::new(192, 168, 0, 2)));
    }

    #[test]
    fn test_sessions_replace_offer_on_same_port() {
        let mut sessions = DccSessions::default();
        let offer = |from: &str| DccReceive {
            from: from.to_string(),
            filename: "x".to_string(),
            size: 1,
            address: Ipv4Addr::LOCALHOST,
            port: 5000,
            id: 0,
            listen_port: None,
            resume_position: 0,
            accepted: false,
        };
        assert!(sessions.add_receive(offer("alice")).is_none());
        let replaced = sessions.add_receive(offer("bob")).unwrap();
        assert_eq!(replaced.from, "alice");
        assert_eq!(sessions.receive(5000, 0).unwrap().from, "bob");
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_sessions_lookup_by_id_when_passive() {
        let mut sessions = DccSessions::default();
        let id = sessions.next_id();
        sessions.add_send(DccSend {
            to: "bob".to_string(),
            filename: "x".to_string(),
            size: 1,
            port: 0,
            id,
            resume_position: 0,
        });
        assert!(sessions.send(0, id).is_some());
        assert!(sessions.send(0, id + 1).is_none());
        assert!(sessions.remove_send(0, id).is_some());
        assert!(sessions.is_empty());
    }

    mod negotiation {
        use super::*;
        use crate::config::{DccConfig, SessionConfig};
        use crate::engine::session::tests::{feed, online_session};
        use crate::engine::session::Session;
        use std::time::{Duration, Instant};

        fn dcc_events(session: &mut Session) -> Vec<Event> {
            session
                .drain_events()
                .into_iter()
                .filter(|e| {
                    !matches!(
                        e,
                        Event::RawSent { .. } | Event::RawReceived { .. } | Event::ServerMessage { .. }
                    )
                })
                .collect()
        }

        const OFFER: &str = ":bob!b@h PRIVMSG crab :\u{1}DCC SEND a.txt 3232235777 5000 42\u{1}";

        #[test]
        fn test_offer_then_accept() {
            let t0 = Instant::now();
            let (mut session, _wire) = online_session(SessionConfig::default(), t0);
            feed(&mut session, OFFER, t0);
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccSendRequest {
                    from: "bob".to_string(),
                    filename: "a.txt".to_string(),
                    size: 42,
                    address: Some(Ipv4Addr::new(192, 168, 1, 1)),
                    port: 5000,
                    id: 0,
                }]
            );

            session.dcc_accept(5000, 0, 0, None, t0).unwrap();
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccReceiveReady {
                    port: 5000,
                    id: 0,
                    position: 0,
                }]
            );
            assert!(matches!(
                session.dcc_accept(6000, 0, 0, None, t0),
                Err(SessionError::UnknownDcc { port: 6000, id: 0 })
            ));
        }

        #[test]
        fn test_oversized_and_private_offers_are_dropped() {
            let config = SessionConfig {
                dcc: DccConfig {
                    max_file_size: 10,
                    ..DccConfig::default()
                },
                ..SessionConfig::default()
            };
            let t0 = Instant::now();
            let (mut session, _wire) = online_session(config, t0);
            feed(&mut session, OFFER, t0);
            assert!(dcc_events(&mut session).is_empty());

            let config = SessionConfig {
                dcc: DccConfig {
                    reject_private_ips: true,
                    ..DccConfig::default()
                },
                ..SessionConfig::default()
            };
            let (mut session, _wire) = online_session(config, t0);
            feed(&mut session, OFFER, t0);
            assert!(dcc_events(&mut session).is_empty());
            assert!(session.core().dcc_sessions().is_empty());
        }

        #[test]
        fn test_resume_request_times_out() {
            let t0 = Instant::now();
            let (mut session, wire) = online_session(SessionConfig::default(), t0);
            feed(&mut session, OFFER, t0);
            session.drain_events();

            session.dcc_accept(5000, 0, 100, None, t0).unwrap();
            assert_eq!(
                wire.take(),
                ["PRIVMSG bob :\u{1}DCC RESUME \"a.txt\" 5000 100\u{1}"]
            );

            session.tick(t0 + Duration::from_secs(14));
            assert!(dcc_events(&mut session).is_empty());
            session.tick(t0 + Duration::from_secs(15));
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccReceiveFailed {
                    port: 5000,
                    id: 0,
                    from: "bob".to_string(),
                    filename: "a.txt".to_string(),
                }]
            );
            assert!(session.core().dcc_sessions().is_empty());
        }

        #[test]
        fn test_resume_accept_is_reported() {
            let t0 = Instant::now();
            let (mut session, _wire) = online_session(SessionConfig::default(), t0);
            feed(&mut session, OFFER, t0);
            session.dcc_accept(5000, 0, 100, None, t0).unwrap();
            session.drain_events();

            feed(&mut session, ":bob!b@h PRIVMSG crab :\u{1}DCC ACCEPT \"a.txt\" 5000 100\u{1}", t0);
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccResumeAccepted {
                    port: 5000,
                    id: 0,
                    position: 100,
                }]
            );
            session.tick(t0 + Duration::from_secs(20));
            assert!(dcc_events(&mut session).is_empty());
        }

        #[test]
        fn test_active_send_advertises_external_address() {
            let t0 = Instant::now();
            let (mut session, wire) = online_session(SessionConfig::default(), t0);
            let external = Ipv4Addr::new(203, 0, 113, 9);
            session.set_external_ip(external);

            let id = session.dcc_send("bob", "/tmp/my file.txt", 42, Some(5000), t0).unwrap();
            assert_eq!(wire.take(), ["WHO bob"]);

            feed(&mut session, ":irc.example.net 352 crab * ~b peer.example irc.example.net bob H :0 Bob", t0);
            feed(&mut session, ":irc.example.net 315 crab bob :End of WHO list", t0);
            assert_eq!(
                wire.take(),
                [format!(
                    "PRIVMSG bob :\u{1}DCC SEND my_file.txt {} 5000 42\u{1}",
                    long_ip(external)
                )]
            );
            assert_eq!(session.core().dcc_sessions().send(5000, id).unwrap().to, "bob");
        }

        #[test]
        fn test_resume_of_our_send() {
            let t0 = Instant::now();
            let (mut session, wire) = online_session(SessionConfig::default(), t0);
            session.dcc_send("bob", "a.txt", 42, Some(5000), t0).unwrap();
            wire.take();

            feed(&mut session, ":bob!b@h PRIVMSG crab :\u{1}DCC RESUME \"a.txt\" 5000 10\u{1}", t0);
            assert_eq!(
                wire.take(),
                ["PRIVMSG bob :\u{1}DCC ACCEPT \"a.txt\" 5000 10\u{1}"]
            );
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccResumeRequested {
                    port: 5000,
                    id: 1,
                    position: 10,
                }]
            );
        }

        #[test]
        fn test_passive_send_answer_and_timeout() {
            let t0 = Instant::now();
            let (mut session, wire) = online_session(SessionConfig::default(), t0);

            let id = session.dcc_send("bob", "a.txt", 42, None, t0).unwrap();
            assert_eq!(
                wire.take(),
                [format!("PRIVMSG bob :\u{1}DCC SEND a.txt 0 0 42 {id}\u{1}")]
            );
            feed(
                &mut session,
                &format!(":bob!b@h PRIVMSG crab :\u{1}DCC SEND a.txt 3405803785 6000 42 {id}\u{1}"),
                t0,
            );
            assert_eq!(
                dcc_events(&mut session),
                [Event::DccPassiveSendReady {
                    id,
                    address: Ipv4Addr::new(203, 0, 113, 9),
                    port: 6000,
                }]
            );

            let other = session.dcc_send("bob", "b.txt", 1, None, t0).unwrap();
            session.tick(t0 + Duration::from_secs(60));
            assert_eq!(
                dcc_events(&mut session),
                [
                    Event::DccSendFailed {
                        port: 0,
                        id: other,
                        to: "bob".to_string(),
                        filename: "b.txt".to_string(),
                    },
                ]
            );
        }
    }
}

//! Inbound dispatch.
//!
//! Numeric replies are offered to the active reply handlers, everything else
//! to the active message handlers, in list order. The first handler that
//! consumes the line ends the walk; when nobody does, the generic handling
//! below turns the line into owner events.

use crate::engine::event::Event;
use crate::engine::handler::Handler;
use crate::engine::handlers::{CtcpLimiter, InitialMode, SuppressMotd, Userhost, Whois};
use crate::engine::scheduler::Priority;
use crate::engine::session::{Core, SessionState};
use crate::irc::reply::{self, *};
use crate::irc::Message;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, info, trace};

struct Slot {
    id: u64,
    /// Taken out while the handler runs.
    handler: Option<Handler>,
}

#[derive(Default)]
pub struct Router {
    replies: Vec<Slot>,
    messages: Vec<Slot>,
    next_id: u64,
}

impl Router {
    pub fn active_count(&self) -> usize {
        self.replies.len() + self.messages.len()
    }

    /// Names of the active handlers, reply handlers first.
    pub fn active_names(&self) -> Vec<&'static str> {
        self.replies
            .iter()
            .chain(&self.messages)
            .filter_map(|slot| slot.handler.as_ref().map(Handler::name))
            .collect()
    }

    fn slot(&mut self, handler: Handler) -> (bool, Slot) {
        self.next_id += 1;
        let reply = handler.is_reply_handler();
        (
            reply,
            Slot {
                id: self.next_id,
                handler: Some(handler),
            },
        )
    }

    fn list_mut(&mut self, reply: bool) -> &mut Vec<Slot> {
        if reply {
            &mut self.replies
        } else {
            &mut self.messages
        }
    }

    pub(crate) fn push_back(&mut self, handler: Handler) {
        let (reply, slot) = self.slot(handler);
        self.list_mut(reply).push(slot);
    }

    pub(crate) fn push_front(&mut self, handler: Handler) {
        let (reply, slot) = self.slot(handler);
        self.list_mut(reply).insert(0, slot);
    }

    /// Take over handlers activated by the send path, at the tail.
    pub(crate) fn adopt(&mut self, activated: &mut Vec<Handler>) {
        for handler in activated.drain(..) {
            trace!(handler = handler.name(), "handler active");
            self.push_back(handler);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.replies.clear();
        self.messages.clear();
    }

    pub(crate) fn dispatch(&mut self, core: &mut Core, message: &Message) {
        match message.numeric() {
            Some(code) => {
                if !self.offer(core, message, Some(code)) {
                    self.generic_reply(core, message, code);
                }
            }
            None => {
                if !self.offer(core, message, None) {
                    self.generic_message(core, message);
                }
            }
        }
    }

    /// Walk a snapshot of the list so handlers that finish mid-walk can be
    /// dropped without skipping their neighbours.
    fn offer(&mut self, core: &mut Core, message: &Message, code: Option<u16>) -> bool {
        let reply = code.is_some();
        let ids: Vec<u64> = self.list_mut(reply).iter().map(|slot| slot.id).collect();

        for id in ids {
            let list = self.list_mut(reply);
            let Some(index) = list.iter().position(|slot| slot.id == id) else {
                continue;
            };
            let Some(mut handler) = list[index].handler.take() else {
                continue;
            };

            let handled = match code {
                Some(code) => handler.handle_reply(core, message, code),
                None => handler.handle_message(core, message, message.command()),
            };

            let list = self.list_mut(reply);
            if handler.is_done() {
                trace!(handler = handler.name(), "handler done");
                list.remove(index);
            } else {
                list[index].handler = Some(handler);
            }
            if handled {
                return true;
            }
        }
        false
    }

    /// Run the timeout callback of every handler past its deadline, then
    /// drop it.
    pub(crate) fn expire(&mut self, core: &mut Core, now: Instant) {
        for reply in [true, false] {
            let expired: Vec<u64> = self
                .list_mut(reply)
                .iter()
                .filter(|slot| slot.handler.as_ref().is_some_and(|h| h.is_expired(now)))
                .map(|slot| slot.id)
                .collect();

            for id in expired {
                let list = self.list_mut(reply);
                let Some(index) = list.iter().position(|slot| slot.id == id) else {
                    continue;
                };
                let slot = list.remove(index);
                if let Some(mut handler) = slot.handler {
                    debug!(handler = handler.name(), "handler timed out");
                    handler.expire(core);
                }
            }
        }
    }

    fn generic_message(&mut self, core: &mut Core, message: &Message) {
        let sender = message.sender().to_string();
        let first = message.param(0).unwrap_or_default();
        let command = message.command();

        match command {
            "PING" => {
                let pong = Message::new("PONG").with_param(first);
                core.send_logged(&pong, Priority::Normal, None, 0);
            }
            "PRIVMSG" | "NOTICE" => self.chat_message(core, message),
            "JOIN" => {
                let target = core.chat_target(first);
                if core.is_own_nick(&sender) {
                    let mode = Message::new("MODE").with_param(first);
                    core.send_logged(&mode, Priority::Normal, Some(Handler::reply(InitialMode)), 0);
                    core.emit(Event::ChannelJoined {
                        target,
                        nick: None,
                        password: None,
                    });
                } else {
                    core.emit(Event::ChannelJoined {
                        target,
                        nick: Some(sender.clone()),
                        password: None,
                    });
                    core.contact_joined(&sender);
                }
            }
            "PART" => {
                let own = core.is_own_nick(&sender);
                core.emit(Event::ChannelLeft {
                    target: core.chat_target(first),
                    nick: (!own).then(|| sender.clone()),
                    reason: if own { None } else { message.param(1).map(str::to_string) },
                });
            }
            "QUIT" => {
                core.emit(Event::Quit {
                    nick: sender.clone(),
                    reason: message.param(0).map(str::to_string),
                });
                core.contact_quit(&sender);
            }
            "KICK" if message.param_count() >= 2 => {
                let kicked = &message.params()[1];
                core.emit(Event::Kicked {
                    target: core.chat_target(first),
                    nick: (!core.is_own_nick(kicked)).then(|| kicked.clone()),
                    by: sender,
                    reason: message.param(2).map(str::to_string),
                });
            }
            "TOPIC" if message.param_count() >= 2 => {
                core.emit(Event::TopicChanged {
                    target: core.chat_target(first),
                    by: (!message.sender_is_server()).then_some(sender),
                    topic: message.params()[1].clone(),
                });
            }
            "NICK" if message.param_count() >= 1 => {
                let new = first.to_string();
                if core.is_own_nick(&sender) {
                    info!(old = %sender, new = %new, "own nickname changed");
                    core.nick = new.clone();
                }
                core.emit(Event::NicknameChanged { old: sender, new });
            }
            "INVITE" if message.param_count() >= 2 => {
                core.emit(Event::Invite {
                    from: sender,
                    target: core.chat_target(&message.params()[1]),
                });
            }
            "MODE" => core.report_mode_changes(message, false),
            "WALLOPS" => core.emit(Event::ServerInformation {
                text: first.to_string(),
            }),
            _ => trace!(command, "unhandled command"),
        }
    }

    fn chat_message(&mut self, core: &mut Core, message: &Message) {
        if message.param_count() < 2 {
            return;
        }
        let sender = message.sender().to_string();
        let destination = &message.params()[0];

        let text = if !message.is_ctcp() {
            message.params()[1].clone()
        } else if message.is_command("PRIVMSG") {
            // A new request window; the limiter takes it from here.
            let mut limiter = CtcpLimiter::handler(&core.config.ctcp);
            limiter.activate(core.now);
            limiter.handle_message(core, message, "PRIVMSG");
            if !limiter.is_done() {
                self.push_back(limiter);
            }
            return;
        } else {
            ctcp_reply_text(core, message)
        };

        if text.is_empty() || sender.is_empty() {
            return;
        }
        if message.sender_is_server() {
            core.emit(Event::ServerInformation { text });
            return;
        }
        if is_mirc_dcc_notice(&text) {
            debug!(from = %sender, "dropping mIRC DCC notice");
            return;
        }

        let event = if core.support.is_channel(destination) {
            Event::ChannelMessage {
                target: core.chat_target(destination),
                from: Some(sender),
                text,
                action: false,
            }
        } else {
            Event::PrivateMessage {
                peer: sender,
                text,
                action: false,
                outgoing: false,
            }
        };
        core.emit(event);
    }

    fn generic_reply(&mut self, core: &mut Core, message: &Message, code: u16) {
        let channel = message.param(1).unwrap_or_default();

        match code {
            ERR_NICKNAMEINUSE if message.param_count() >= 2 => {
                core.emit(Event::NicknameInUse {
                    nick: channel.to_string(),
                });
            }
            RPL_WELCOME | RPL_YOURHOST => {
                if core.state != SessionState::Online {
                    self.complete_registration(core, message);
                }
            }
            RPL_ISUPPORT => core.support.apply_isupport(message),
            RPL_WHOISUSER => {
                let mut whois = Handler::reply(Whois::default());
                whois.activate(core.now);
                whois.handle_reply(core, message, code);
                if !whois.is_done() {
                    self.push_front(whois);
                }
            }
            RPL_TOPIC if message.param_count() >= 3 => {
                core.emit(Event::TopicChanged {
                    target: core.chat_target(channel),
                    by: None,
                    topic: message.params()[2].clone(),
                });
            }
            RPL_AWAY if message.param_count() >= 3 => {
                core.emit(Event::NickAway {
                    nick: channel.to_string(),
                    message: message.params()[2].clone(),
                });
            }
            RPL_NAMREPLY if message.param_count() >= 4 => {
                let target = core.chat_target(&message.params()[2]);
                for entry in message.params()[3].split_whitespace() {
                    let (prefix, nick) = core.support.split_nick_prefix(entry);
                    let op = !prefix.is_empty() && core.support.prefix_is_op_or_better(prefix);
                    let voice = !op && !prefix.is_empty() && core.support.prefix_is_voice_or_better(prefix);
                    let event = Event::ChannelUser {
                        target: target.clone(),
                        nick: nick.to_string(),
                        prefix: prefix.to_string(),
                        op,
                        voice,
                    };
                    core.emit(event);
                }
            }
            RPL_ENDOFNAMES => core.emit(Event::ChannelUsersDone {
                target: core.chat_target(channel),
            }),
            ERR_BADCHANNELKEY => core.emit(Event::ChannelPasswordRequired {
                target: core.chat_target(channel),
            }),
            code if reply::is_displayed(code) => core.emit(Event::ServerMessage {
                text: message.joined_params(1),
            }),
            _ => trace!(code, "unhandled reply"),
        }
    }

    fn complete_registration(&mut self, core: &mut Core, message: &Message) {
        if let Some(assigned) = message.param(0).filter(|nick| !nick.is_empty()) {
            if !core.nick.eq_ignore_ascii_case(assigned) {
                let old = std::mem::replace(&mut core.nick, assigned.to_string());
                core.emit(Event::NicknameChanged {
                    old,
                    new: assigned.to_string(),
                });
            }
        }

        self.push_front(Handler::reply(SuppressMotd));
        let userhost = Message::new("USERHOST").with_param(core.nick.clone());
        core.send_logged(&userhost, Priority::Normal, Some(Handler::reply(Userhost)), 0);

        core.state = SessionState::Online;
        info!(nick = %core.nick, "registered");
        core.send_ison(core.config.presence.initial_delay_secs);
        core.emit(Event::ProtocolReady);
    }
}

/// Text shown for a CTCP reply we received.
fn ctcp_reply_text(core: &Core, message: &Message) -> String {
    let Some(info) = message.ctcp_info() else {
        return String::new();
    };
    if info.is("PING") {
        let sent = info.param(0).and_then(|s| s.parse::<i64>().ok()).unwrap_or_default();
        let elapsed = core.current_time().timestamp() - sent;
        format!("PING reply: {elapsed} second(s)")
    } else {
        format!("{} {}", info.kind(), info.raw_params())
    }
}

/// mIRC announces DCC offers with a NOTICE such as
/// `DCC Send file.txt (192.168.0.2)` next to the CTCP itself.
fn is_mirc_dcc_notice(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if !(lower.starts_with("dcc send") || lower.starts_with("dcc chat")) {
        return false;
    }
    text.strip_suffix(')')
        .and_then(|rest| rest.rsplit_once('('))
        .is_some_and(|(_, address)| address.parse::<Ipv4Addr>().is_ok())
}

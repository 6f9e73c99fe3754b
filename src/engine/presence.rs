//! Contact presence tracking.
//!
//! While online, tracked nicknames are polled with ISON. Contacts that show
//! up are optionally refined with WHO (to see the away flag) and WHOIS (to
//! fetch the away text). Contacts missing from a complete ISON answer are
//! reported offline.

use crate::engine::event::Event;
use crate::engine::handler::Handler;
use crate::engine::handlers::{PresenceIson, PresenceWho, PresenceWhois};
use crate::engine::scheduler::Priority;
use crate::engine::session::{Core, SessionState};
use crate::irc::Message;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    nick: String,
    online: bool,
    awaiting_reply: bool,
    away_message: String,
}

impl Contact {
    fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            online: false,
            awaiting_reply: false,
            away_message: String::new(),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_away(&self) -> bool {
        !self.away_message.is_empty()
    }

    pub fn away_message(&self) -> &str {
        &self.away_message
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }
}

/// Nicknames tracked on behalf of the owner's contact entries. Nicks compare
/// case-insensitively.
#[derive(Debug, Default)]
pub struct Contacts {
    by_nick: BTreeMap<String, Contact>,
    by_owner: HashMap<i32, Vec<String>>,
}

fn key(nick: &str) -> String {
    nick.to_ascii_lowercase()
}

impl Contacts {
    /// Track the comma separated `nicknames` for owner entry `id`. Returns
    /// how many were new.
    pub fn add(&mut self, id: i32, nicknames: &str) -> usize {
        let mut added = 0;
        for nick in nicknames.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let key = key(nick);
            if !self.by_nick.contains_key(&key) {
                self.by_nick.insert(key.clone(), Contact::new(nick));
                added += 1;
            }
            let owned = self.by_owner.entry(id).or_default();
            if !owned.contains(&key) {
                owned.push(key);
            }
        }
        added
    }

    /// Stop tracking everything entry `id` added. Nicks still claimed by
    /// another entry stay. Returns the nicks dropped.
    pub fn remove(&mut self, id: i32) -> Vec<String> {
        let Some(keys) = self.by_owner.remove(&id) else {
            return Vec::new();
        };
        keys.into_iter()
            .filter(|key| !self.by_owner.values().any(|owned| owned.contains(key)))
            .filter_map(|key| self.by_nick.remove(&key))
            .map(|contact| contact.nick)
            .collect()
    }

    pub fn get(&self, nick: &str) -> Option<&Contact> {
        self.by_nick.get(&key(nick))
    }

    pub(crate) fn get_mut(&mut self, nick: &str) -> Option<&mut Contact> {
        self.by_nick.get_mut(&key(nick))
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.by_nick.contains_key(&key(nick))
    }

    pub fn len(&self) -> usize {
        self.by_nick.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_nick.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.by_nick.values()
    }

    /// Start a poll cycle: every contact now awaits an ISON mention.
    fn prepare_poll(&mut self) -> Vec<String> {
        self.by_nick
            .values_mut()
            .map(|contact| {
                contact.awaiting_reply = true;
                contact.nick.clone()
            })
            .collect()
    }

    /// Contacts the finished cycle did not mention; they are marked offline.
    fn take_unanswered(&mut self) -> Vec<String> {
        self.by_nick
            .values_mut()
            .filter(|contact| contact.awaiting_reply)
            .map(|contact| {
                contact.awaiting_reply = false;
                contact.online = false;
                contact.away_message.clear();
                contact.nick.clone()
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.by_nick.clear();
        self.by_owner.clear();
    }
}

impl Core {
    pub(crate) fn add_contacts(&mut self, id: i32, nicknames: &str) {
        let added = self.contacts.add(id, nicknames);
        debug!(id, added, total = self.contacts.len(), "contacts added");
        if added > 0 && !self.polling {
            self.send_ison(0);
        }
    }

    /// Replace what entry `id` tracks. A running poll cycle carries on and
    /// picks up the new nicks on its next round.
    pub(crate) fn change_contacts(&mut self, id: i32, nicknames: &str) {
        self.remove_contacts(id);
        self.add_contacts(id, nicknames);
    }

    pub(crate) fn remove_contacts(&mut self, id: i32) {
        for nick in self.contacts.remove(id) {
            self.emit(Event::PresenceOffline { nick });
        }
    }

    /// Queue one ISON poll cycle. Nothing happens unless we are online and
    /// something is tracked.
    pub(crate) fn send_ison(&mut self, delay_secs: u32) {
        if self.state != SessionState::Online || self.contacts.is_empty() {
            return;
        }
        let mut ison = Message::new("ISON");
        for nick in self.contacts.prepare_poll() {
            ison.push_param(nick);
        }
        self.polling = true;
        self.send_logged(&ison, Priority::Low, Some(Handler::reply(PresenceIson)), delay_secs);
    }

    /// `nick` appeared in an ISON answer.
    pub(crate) fn contact_seen(&mut self, nick: &str) {
        let Some(contact) = self.contacts.get_mut(nick) else {
            debug!(nick, "ISON mentioned an untracked nick");
            return;
        };
        let was_online = contact.online;
        contact.awaiting_reply = false;
        contact.online = true;
        let nick = contact.nick.clone();

        if !was_online {
            self.emit(Event::InitialPresence { nick: nick.clone() });
        }
        if self.config.presence.refine_away {
            let who = Message::new("WHO").with_param(&nick);
            let handler = Handler::reply(PresenceWho::new(&nick));
            self.send_logged(&who, Priority::Low, Some(handler), 0);
        }
    }

    /// All lines of the ISON poll are answered.
    pub(crate) fn finish_poll(&mut self) {
        self.polling = false;
        for nick in self.contacts.take_unanswered() {
            self.emit(Event::PresenceOffline { nick });
        }
        self.send_ison(self.config.presence.poll_interval_secs);
    }

    /// WHO status flags for a contact: `G` means gone.
    pub(crate) fn contact_status(&mut self, nick: &str, status: &str) {
        let Some(contact) = self.contacts.get_mut(nick) else {
            return;
        };
        let gone = status.contains('G');
        if gone && !contact.is_away() {
            let whois = Message::new("WHOIS").with_param(nick);
            let handler = Handler::reply(PresenceWhois::default());
            self.send_logged(&whois, Priority::Low, Some(handler), 0);
        } else if !gone && contact.is_away() {
            contact.away_message.clear();
            let nick = contact.nick.clone();
            self.emit(Event::PresenceUpdate {
                nick,
                away_message: String::new(),
            });
        }
    }

    pub(crate) fn contact_away(&mut self, nick: &str, away_message: &str) {
        let Some(contact) = self.contacts.get_mut(nick) else {
            return;
        };
        contact.away_message = away_message.to_string();
        let nick = contact.nick.clone();
        self.emit(Event::PresenceUpdate {
            nick,
            away_message: away_message.to_string(),
        });
    }

    /// Another user joined a channel we are in. A tracked contact is
    /// evidently online.
    pub(crate) fn contact_joined(&mut self, nick: &str) {
        if let Some(contact) = self.contacts.get_mut(nick) {
            if !contact.online {
                contact.online = true;
                let nick = contact.nick.clone();
                self.emit(Event::InitialPresence { nick });
            }
        }
    }

    pub(crate) fn contact_quit(&mut self, nick: &str) {
        if let Some(contact) = self.contacts.get_mut(nick) {
            contact.online = false;
            contact.away_message.clear();
            let nick = contact.nick.clone();
            self.emit(Event::PresenceOffline { nick });
        }
    }
}

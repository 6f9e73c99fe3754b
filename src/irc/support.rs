//! Server capability tables.
//!
//! Starts out with RFC 1459 defaults and is refined from `RPL_ISUPPORT`
//! (005) tokens as the server advertises them.

use crate::irc::Message;
use std::net::IpAddr;

/// Which channel modes take a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeInfo {
    always: String,
    when_set: String,
    never: String,
}

impl Default for ModeInfo {
    fn default() -> Self {
        Self {
            always: "obkv".to_string(),
            when_set: "l".to_string(),
            never: "psitnm".to_string(),
        }
    }
}

impl ModeInfo {
    pub fn has_mode(&self, mode: char) -> bool {
        self.always.contains(mode) || self.when_set.contains(mode) || self.never.contains(mode)
    }

    pub fn requires_parameter(&self, mode: char, setting: bool) -> bool {
        self.always.contains(mode) || (setting && self.when_set.contains(mode))
    }

    fn add_always(&mut self, mode: char) {
        if !self.has_mode(mode) {
            self.always.push(mode);
        }
    }

    fn add_when_set(&mut self, mode: char) {
        if !self.has_mode(mode) {
            self.when_set.push(mode);
        }
    }

    fn add_never(&mut self, mode: char) {
        if !self.has_mode(mode) {
            self.never.push(mode);
        }
    }
}

/// One `+x`/`-x` change extracted from a MODE line or RPL_CHANNELMODEIS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: char,
    pub set: bool,
    pub parameter: Option<String>,
    /// Mode grants a nickname prefix (`o`, `v`, ...).
    pub user_mode: bool,
    pub op_or_better: bool,
    pub voice_or_better: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSupport {
    channel_prefixes: String,
    user_modes: String,
    user_prefixes: String,
    mode_info: ModeInfo,
}

impl Default for ServerSupport {
    fn default() -> Self {
        Self {
            channel_prefixes: "#&".to_string(),
            user_modes: "ov".to_string(),
            user_prefixes: "@+".to_string(),
            mode_info: ModeInfo::default(),
        }
    }
}

impl ServerSupport {
    pub fn mode_info(&self) -> &ModeInfo {
        &self.mode_info
    }

    pub fn channel_prefixes(&self) -> &str {
        &self.channel_prefixes
    }

    /// Apply the CHANMODES, CHANTYPES and PREFIX tokens of an RPL_ISUPPORT
    /// reply. Unknown tokens are ignored.
    pub fn apply_isupport(&mut self, reply: &Message) {
        for token in reply.params().iter().skip(1) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "CHANMODES" => self.apply_chanmodes(value),
                "CHANTYPES" => self.channel_prefixes = value.to_string(),
                "PREFIX" => self.apply_prefix(value),
                _ => {}
            }
        }
    }

    fn apply_chanmodes(&mut self, value: &str) {
        for (group, modes) in value.split(',').take(4).enumerate() {
            for mode in modes.chars() {
                match group {
                    0 | 1 => self.mode_info.add_always(mode),
                    2 => self.mode_info.add_when_set(mode),
                    _ => self.mode_info.add_never(mode),
                }
            }
        }
    }

    // "(ov)@+": mode letters in parentheses, display prefixes after.
    fn apply_prefix(&mut self, value: &str) {
        let Some(rest) = value.strip_prefix('(') else {
            return;
        };
        let Some((modes, prefixes)) = rest.split_once(')') else {
            return;
        };
        for mode in modes.chars() {
            self.mode_info.add_always(mode);
        }
        self.user_modes = modes.to_string();
        self.user_prefixes = prefixes.to_string();
    }

    pub fn is_channel(&self, target: &str) -> bool {
        target
            .chars()
            .next()
            .is_some_and(|c| self.channel_prefixes.contains(c))
    }

    /// Room name as shown to the owner. Only `#` is stripped.
    pub fn strip_channel_prefix<'a>(&self, channel: &'a str) -> &'a str {
        channel.strip_prefix('#').unwrap_or(channel)
    }

    /// Inverse of [`strip_channel_prefix`](Self::strip_channel_prefix):
    /// adds `#` unless the name already starts with another channel prefix.
    pub fn prefix_channel(&self, room: &str) -> String {
        if room.is_empty() {
            return String::new();
        }
        let other_prefix = room
            .chars()
            .next()
            .is_some_and(|c| c != '#' && self.channel_prefixes.contains(c));
        if other_prefix {
            room.to_string()
        } else {
            format!("#{room}")
        }
    }

    /// Split `@nick` into (`"@"`, `"nick"`).
    pub fn split_nick_prefix<'a>(&self, nick: &'a str) -> (&'a str, &'a str) {
        match nick.chars().next() {
            Some(c) if self.user_prefixes.contains(c) => nick.split_at(c.len_utf8()),
            _ => ("", nick),
        }
    }

    pub fn mode_is_op_or_better(&self, mode: char) -> bool {
        ranks_within(self.user_modes.find(mode), self.user_modes.rfind(['o', 'h']))
    }

    pub fn mode_is_voice_or_better(&self, mode: char) -> bool {
        ranks_within(self.user_modes.find(mode), self.user_modes.find('v'))
    }

    pub fn prefix_is_op_or_better(&self, prefix: &str) -> bool {
        ranks_within(
            self.prefix_position(prefix),
            self.user_modes.rfind(['o', 'h']),
        )
    }

    pub fn prefix_is_voice_or_better(&self, prefix: &str) -> bool {
        ranks_within(self.prefix_position(prefix), self.user_modes.find('v'))
    }

    fn prefix_position(&self, prefix: &str) -> Option<usize> {
        let c = prefix.chars().next()?;
        self.user_prefixes.chars().position(|p| p == c)
    }

    /// Split a channel MODE line (or RPL_CHANNELMODEIS reply) into single
    /// changes. Returns the channel and the changes; `None` for user modes.
    pub fn parse_mode_changes(&self, message: &Message) -> Option<(String, Vec<ModeChange>)> {
        let start = usize::from(message.is_numeric_reply());
        let channel = message.param(start)?;
        let modes = message.param(start + 1)?;
        if !self.is_channel(channel) {
            return None;
        }

        let mut next_param = start + 2;
        let mut setting = None;
        let mut changes = Vec::new();
        for mode in modes.chars() {
            match mode {
                '+' => setting = Some(true),
                '-' => setting = Some(false),
                _ => {
                    let set = setting.unwrap_or(true);
                    let parameter = if self.mode_info.requires_parameter(mode, set) {
                        let p = message.param(next_param).map(str::to_string);
                        if p.is_some() {
                            next_param += 1;
                        }
                        p
                    } else {
                        None
                    };
                    changes.push(ModeChange {
                        mode,
                        set,
                        parameter,
                        user_mode: self.user_modes.contains(mode),
                        op_or_better: self.mode_is_op_or_better(mode),
                        voice_or_better: self.mode_is_voice_or_better(mode),
                    });
                }
            }
        }
        Some((channel.to_string(), changes))
    }
}

fn ranks_within(position: Option<usize>, limit: Option<usize>) -> bool {
    matches!((position, limit), (Some(p), Some(l)) if p <= l)
}

/// Ban mask for a user seen as `user@host`: `*!*user@` followed by the
/// address with its most specific part wildcarded. A leading `~` (no ident)
/// is dropped from the user name.
pub fn ban_mask(user: &str, host: &str) -> String {
    let user = user.strip_prefix('~').unwrap_or(user);
    let mut mask = format!("*!*{user}@");

    if host.parse::<IpAddr>().is_ok() {
        match host.rfind(['.', ':']) {
            Some(pos) => {
                mask.push_str(&host[..=pos]);
                mask.push('*');
            }
            None => mask.push_str(host),
        }
        return mask;
    }

    let dots: Vec<usize> = host.match_indices('.').map(|(i, _)| i).collect();
    match dots.len() {
        2 => {
            mask.push('*');
            mask.push_str(&host[dots[0]..]);
        }
        n if n > 2 => {
            mask.push('*');
            mask.push_str(&host[dots[n - 3]..]);
        }
        _ => mask.push_str(host),
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isupport(line: &str) -> Message {
        Message::parse(line).unwrap()
    }

    #[test]
    fn test_defaults() {
        let support = ServerSupport::default();
        assert!(support.is_channel("#rust"));
        assert!(support.is_channel("&local"));
        assert!(!support.is_channel("alice"));
        assert!(support.mode_info().requires_parameter('l', true));
        assert!(!support.mode_info().requires_parameter('l', false));
        assert!(support.mode_info().requires_parameter('b', false));
    }

    #[test]
    fn test_channel_prefix_helpers() {
        let support = ServerSupport::default();
        assert_eq!(support.strip_channel_prefix("#rust"), "rust");
        assert_eq!(support.strip_channel_prefix("&local"), "&local");
        assert_eq!(support.prefix_channel("rust"), "#rust");
        assert_eq!(support.prefix_channel("&local"), "&local");
        assert_eq!(support.prefix_channel("#rust"), "##rust");
        assert_eq!(support.prefix_channel(""), "");
    }

    #[test]
    fn test_isupport_updates_tables() {
        let mut support = ServerSupport::default();
        support.apply_isupport(&isupport(
            ":srv 005 me CHANTYPES=#+ CHANMODES=beI,kf,lj,psmntirRcOAQKVCuzNSMTG PREFIX=(qaohv)~&@%+ :are supported",
        ));
        assert!(support.is_channel("+modeless"));
        assert!(!support.is_channel("&local"));
        assert!(support.mode_info().requires_parameter('I', false));
        assert!(support.mode_info().requires_parameter('j', true));
        assert!(!support.mode_info().requires_parameter('j', false));
        assert!(support.mode_info().requires_parameter('q', false));

        assert_eq!(support.split_nick_prefix("%helper"), ("%", "helper"));
        assert!(support.prefix_is_op_or_better("%"));
        assert!(support.prefix_is_op_or_better("~"));
        assert!(!support.prefix_is_op_or_better("+"));
        assert!(support.prefix_is_voice_or_better("+"));
        assert!(support.mode_is_op_or_better('h'));
        assert!(!support.mode_is_op_or_better('v'));
    }

    #[test]
    fn test_unknown_prefix_is_not_ranked() {
        let support = ServerSupport::default();
        assert_eq!(support.split_nick_prefix("bob"), ("", "bob"));
        assert!(!support.prefix_is_voice_or_better(""));
        assert!(!support.mode_is_op_or_better('x'));
    }

    #[test]
    fn test_parse_mode_changes() {
        let support = ServerSupport::default();
        let msg = Message::parse(":op!o@h MODE #chan +ol-v+k alice 10 bob secret").unwrap();
        let (channel, changes) = support.parse_mode_changes(&msg).unwrap();
        assert_eq!(channel, "#chan");
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].parameter.as_deref(), Some("alice"));
        assert!(changes[0].user_mode && changes[0].op_or_better);
        assert_eq!(changes[1].mode, 'l');
        assert_eq!(changes[1].parameter.as_deref(), Some("10"));
        assert!(!changes[2].set);
        assert_eq!(changes[2].parameter.as_deref(), Some("bob"));
        assert!(changes[2].voice_or_better && !changes[2].op_or_better);
        assert_eq!(changes[3].parameter.as_deref(), Some("secret"));
    }

    #[test]
    fn test_channel_mode_reply_skips_target() {
        let support = ServerSupport::default();
        let msg = Message::parse(":srv 324 me #chan +nt").unwrap();
        let (channel, changes) = support.parse_mode_changes(&msg).unwrap();
        assert_eq!(channel, "#chan");
        assert_eq!(changes.iter().map(|c| c.mode).collect::<String>(), "nt");
        assert!(changes.iter().all(|c| c.parameter.is_none()));
    }

    #[test]
    fn test_user_mode_is_ignored() {
        let support = ServerSupport::default();
        let msg = Message::parse(":me MODE me +i").unwrap();
        assert!(support.parse_mode_changes(&msg).is_none());
    }

    #[test]
    fn test_ban_mask() {
        assert_eq!(ban_mask("~joe", "10.0.0.7"), "*!*joe@10.0.0.*");
        assert_eq!(ban_mask("joe", "foo.bar.com"), "*!*joe@*.bar.com");
        assert_eq!(
            ban_mask("joe", "81-86-33-95.dsl.pipex.com"),
            "*!*joe@*.dsl.pipex.com"
        );
        assert_eq!(ban_mask("joe", "a.b.c.d.e"), "*!*joe@*.c.d.e");
        assert_eq!(ban_mask("joe", "localhost"), "*!*joe@localhost");
        assert_eq!(ban_mask("joe", "2001:db8::1"), "*!*joe@2001:db8::*");
    }
}

//! IRC wire message value object.
//!
//! A [`Message`] is built once (either by parsing a received line or with the
//! builder methods for an outgoing command) and is not mutated after it has
//! been handed to the scheduler or the router. CTCP payloads are stored
//! unwrapped: the `\x01` delimiters are added on serialization and removed on
//! parsing, with [`Message::is_ctcp`] recording that they were there.

use crate::error::ParseError;
use crate::irc::ctcp::{CtcpInfo, CTCP_DELIM};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Longest line we write, excluding the trailing CRLF.
pub const MAX_LINE_LEN: usize = 510;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    prefix: Option<String>,
    command: String,
    params: Vec<String>,
    ctcp: bool,
}

impl Message {
    /// Start an outgoing message. Commands are stored upper-cased.
    pub fn new(command: impl AsRef<str>) -> Self {
        Self {
            prefix: None,
            command: command.as_ref().to_ascii_uppercase(),
            params: Vec::new(),
            ctcp: false,
        }
    }

    /// A PRIVMSG or NOTICE carrying a CTCP payload such as `VERSION` or
    /// `ACTION waves`.
    pub fn ctcp(command: &str, target: &str, payload: impl Into<String>) -> Self {
        let mut msg = Self::new(command).with_param(target).with_param(payload);
        msg.ctcp = true;
        msg
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn push_param(&mut self, param: impl Into<String>) {
        self.params.push(param.into());
    }

    pub fn set_ctcp(&mut self, ctcp: bool) {
        self.ctcp = ctcp;
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_command(&self, command: &str) -> bool {
        self.command.eq_ignore_ascii_case(command)
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_ctcp(&self) -> bool {
        self.ctcp
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Three-digit numeric replies, e.g. `001` or `433`.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    pub fn is_numeric_reply(&self) -> bool {
        self.numeric().is_some()
    }

    /// Nickname part of the prefix (`nick!user@host` -> `nick`), or the whole
    /// prefix when it names a server. Empty when there is no prefix.
    pub fn sender(&self) -> &str {
        match self.prefix.as_deref() {
            Some(prefix) => prefix.split(['!', '@']).next().unwrap_or(prefix),
            None => "",
        }
    }

    /// `user@host` part of the prefix, if the sender is a user.
    pub fn sender_userhost(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.split_once('!').map(|(_, userhost)| userhost)
    }

    /// Server-originated lines have no prefix or a bare dotted host name as
    /// prefix. Nicknames cannot contain dots.
    pub fn sender_is_server(&self) -> bool {
        match self.prefix.as_deref() {
            None => true,
            Some(prefix) => !prefix.contains(['!', '@']) && prefix.contains('.'),
        }
    }

    /// Parameters from `start` onwards joined with single spaces.
    pub fn joined_params(&self, start: usize) -> String {
        self.params.get(start..).map(|p| p.join(" ")).unwrap_or_default()
    }

    pub fn ctcp_info(&self) -> Option<CtcpInfo> {
        if !self.ctcp {
            return None;
        }
        self.params.last().map(|payload| CtcpInfo::parse(payload))
    }

    /// Parse one received line. A trailing CR/LF is tolerated; IRCv3 message
    /// tags are skipped.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if rest.starts_with('@') {
            rest = rest.split_once(' ').map(|(_, r)| r).unwrap_or("");
        }
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped.split_once(' ').ok_or(ParseError::MissingCommand)?;
            prefix = Some(p.to_string());
            rest = r.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        if !command.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidCommand(command.to_string()));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, r)) => {
                    params.push(p.to_string());
                    rest = r;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        let command = command.to_ascii_uppercase();
        let mut ctcp = false;
        if (command == "PRIVMSG" || command == "NOTICE") && params.len() >= 2 {
            if let Some(last) = params.last_mut() {
                if let Some(inner) = last.strip_prefix(CTCP_DELIM) {
                    *last = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner).to_string();
                    ctcp = true;
                }
            }
        }

        Ok(Self {
            prefix,
            command,
            params,
            ctcp,
        })
    }

    /// Serialize to a single line without CRLF. CR, LF and NUL are dropped
    /// from every field, so the result is always exactly one wire line.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(64);
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(&clean(prefix));
            line.push(' ');
        }
        line.push_str(&clean(&self.command));

        let count = self.params.len();
        for (index, param) in self.params.iter().enumerate() {
            line.push(' ');
            let param = clean(param);
            if index + 1 == count {
                let text = if self.ctcp {
                    Cow::Owned(format!("{CTCP_DELIM}{param}{CTCP_DELIM}"))
                } else {
                    param
                };
                if text.is_empty() || text.contains(' ') || text.starts_with(':') {
                    line.push(':');
                }
                line.push_str(&text);
            } else {
                line.push_str(&param);
            }
        }
        line
    }

    /// Serialize to as many wire lines as needed to keep each one within
    /// `max_len` bytes. Only chat text (PRIVMSG/NOTICE) and ISON nick lists
    /// are folded; anything else is returned as one line.
    pub fn to_lines(&self, max_len: usize) -> Vec<String> {
        let line = self.to_line();
        if line.len() <= max_len {
            return vec![line];
        }

        if self.command == "ISON" {
            return self.fold_nicknames(max_len);
        }

        if (self.command == "PRIVMSG" || self.command == "NOTICE") && self.params.len() >= 2 {
            if let Some(lines) = self.fold_text(max_len) {
                return lines;
            }
        }

        vec![line]
    }

    fn fold_text(&self, max_len: usize) -> Option<Vec<String>> {
        let last = self.params.len() - 1;
        let text = &self.params[last];

        // The CTCP type has to be repeated in every chunk.
        let (kind, body) = match (self.ctcp, text.split_once(' ')) {
            (true, Some((kind, body))) => (Some(kind), body),
            (true, None) => return None,
            (false, _) => (None, text.as_str()),
        };

        let mut head = self.clone();
        head.params[last] = match kind {
            Some(kind) => format!("{kind} "),
            None => String::new(),
        };
        // "CMD target :" plus the CTCP delimiters and type prefix.
        let overhead = head.to_line().len();
        if overhead >= max_len {
            return None;
        }

        let lines = split_text(body, max_len - overhead)
            .into_iter()
            .map(|chunk| {
                let mut part = self.clone();
                part.params[last] = match kind {
                    Some(kind) => format!("{kind} {chunk}"),
                    None => chunk,
                };
                part.to_line()
            })
            .collect();
        Some(lines)
    }

    fn fold_nicknames(&self, max_len: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = Message::new("ISON");
        for nick in &self.params {
            let candidate = current.clone().with_param(nick.as_str());
            if current.param_count() > 0 && candidate.to_line().len() > max_len {
                lines.push(current.to_line());
                current = Message::new("ISON").with_param(nick.as_str());
            } else {
                current = candidate;
            }
        }
        if current.param_count() > 0 {
            lines.push(current.to_line());
        }
        lines
    }
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\r' | '\n' | '\0')
}

fn clean(field: &str) -> Cow<'_, str> {
    if field.contains(is_line_break) {
        Cow::Owned(field.chars().filter(|&c| !is_line_break(c)).collect())
    } else {
        Cow::Borrowed(field)
    }
}

/// Split `text` into chunks of at most `budget` bytes, preferring to break at
/// spaces and never inside a UTF-8 sequence.
fn split_text(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > budget {
        let mut cut = budget;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if let Some(space) = rest[..cut].rfind(' ').filter(|&pos| pos > 0) {
            cut = space;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches(' ');
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix_and_trailing() {
        let msg = Message::parse(":alice!al@host.example PRIVMSG #rust :hello there\r\n").unwrap();
        assert_eq!(msg.command(), "PRIVMSG");
        assert_eq!(msg.params(), ["#rust", "hello there"]);
        assert_eq!(msg.sender(), "alice");
        assert_eq!(msg.sender_userhost(), Some("al@host.example"));
        assert!(!msg.sender_is_server());
        assert!(!msg.is_ctcp());
    }

    #[test]
    fn test_parse_numeric_reply() {
        let msg = Message::parse(":irc.example.net 001 me :Welcome to the network").unwrap();
        assert_eq!(msg.numeric(), Some(1));
        assert!(msg.sender_is_server());
        assert_eq!(msg.param(0), Some("me"));
        assert_eq!(msg.joined_params(1), "Welcome to the network");
    }

    #[test]
    fn test_parse_without_prefix() {
        let msg = Message::parse("PING :irc.example.net").unwrap();
        assert_eq!(msg.command(), "PING");
        assert_eq!(msg.param(0), Some("irc.example.net"));
        assert!(msg.numeric().is_none());
    }

    #[test]
    fn test_parse_skips_tags() {
        let msg = Message::parse("@time=2024-01-01T00:00:00Z :n!u@h JOIN #chan").unwrap();
        assert_eq!(msg.command(), "JOIN");
        assert_eq!(msg.param(0), Some("#chan"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Message::parse("\r\n"), Err(ParseError::Empty));
        assert_eq!(Message::parse(":prefixonly"), Err(ParseError::MissingCommand));
        assert!(matches!(
            Message::parse("PRIV;MSG x"),
            Err(ParseError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_ctcp_is_unwrapped() {
        let msg = Message::parse(":bob!b@h PRIVMSG me :\x01ACTION waves\x01").unwrap();
        assert!(msg.is_ctcp());
        assert_eq!(msg.param(1), Some("ACTION waves"));
        let info = msg.ctcp_info().unwrap();
        assert_eq!(info.kind(), "ACTION");
        assert_eq!(info.raw_params(), "waves");
        assert_eq!(msg.to_line(), ":bob!b@h PRIVMSG me :\x01ACTION waves\x01");
    }

    #[test]
    fn test_line_breaks_never_reach_the_wire() {
        let msg = Message::new("PRIVMSG")
            .with_param("#ru\nst")
            .with_param("hi\r\nQUIT :owned\0");
        assert_eq!(msg.to_line(), "PRIVMSG #rust :hiQUIT :owned");
        assert_eq!(msg.to_lines(MAX_LINE_LEN), ["PRIVMSG #rust :hiQUIT :owned"]);

        let action = Message::ctcp("PRIVMSG", "bob", "ACTION a\r\nb");
        assert_eq!(action.to_line(), "PRIVMSG bob :\x01ACTION ab\x01");
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            Message::new("privmsg").with_param("#chan").with_param("two words"),
            Message::new("USER").with_param("me").with_param("8").with_param("*").with_param("Real Name"),
            Message::new("MODE").with_param("#chan").with_param("+o").with_param("bob"),
            Message::new("TOPIC").with_param("#chan").with_param(""),
            Message::new("QUIT"),
            Message::ctcp("NOTICE", "bob", "VERSION client 1.0"),
        ];
        for msg in cases {
            let parsed = Message::parse(&msg.to_line()).unwrap();
            assert_eq!(parsed.command(), msg.command());
            assert_eq!(parsed.params(), msg.params());
            assert_eq!(parsed.is_ctcp(), msg.is_ctcp());
        }
    }

    #[test]
    fn test_leading_colon_parameter_is_escaped() {
        let msg = Message::new("PRIVMSG").with_param("#c").with_param(":)");
        assert_eq!(msg.to_line(), "PRIVMSG #c ::)");
        assert_eq!(Message::parse(&msg.to_line()).unwrap().param(1), Some(":)"));
    }

    #[test]
    fn test_long_privmsg_is_folded() {
        let text = "word ".repeat(60);
        let msg = Message::new("PRIVMSG").with_param("#chan").with_param(text.trim_end());
        let lines = msg.to_lines(100);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 100, "{} bytes", line.len());
            assert!(line.starts_with("PRIVMSG #chan "));
        }
        let rejoined: Vec<String> = lines
            .iter()
            .map(|l| Message::parse(l).unwrap().param(1).unwrap().to_string())
            .collect();
        assert_eq!(rejoined.join(" "), text.trim_end());
    }

    #[test]
    fn test_long_ctcp_action_keeps_type() {
        let body = "x".repeat(150);
        let msg = Message::ctcp("PRIVMSG", "#chan", format!("ACTION {body}"));
        for line in msg.to_lines(80) {
            assert!(line.len() <= 80);
            let parsed = Message::parse(&line).unwrap();
            assert_eq!(parsed.ctcp_info().unwrap().kind(), "ACTION");
        }
    }

    #[test]
    fn test_long_ison_is_split_by_nick() {
        let mut msg = Message::new("ISON");
        for i in 0..40 {
            msg.push_param(format!("nickname{i:02}"));
        }
        let lines = msg.to_lines(120);
        assert!(lines.len() > 1);
        let total: usize = lines
            .iter()
            .map(|l| Message::parse(l).unwrap().param_count())
            .sum();
        assert_eq!(total, 40);
        assert!(lines.iter().all(|l| l.len() <= 120));
    }

    #[test]
    fn test_split_text_respects_char_boundaries() {
        let chunks = split_text("ééééé", 3);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), "ééééé");
    }
}

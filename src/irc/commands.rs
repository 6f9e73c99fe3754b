//! Slash commands typed into the headless client.
//!
//! [`UserCommand::parse`] turns `/verb args...` into a typed command. Verbs
//! are case-insensitive and most have a short alias. A leading `#chan` or
//! `&chan` argument is optional wherever the driver can fall back to its
//! current target.

use std::str::FromStr;

/// Port assumed when an address names none. Implies TLS.
pub const TLS_PORT: u16 = 6697;

/// `host`, `host:port` or `host:+port`. A `+` forces TLS; port 6697 implies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl From<&str> for ServerAddress {
    fn from(addr: &str) -> Self {
        let Some((host, port)) = addr.rsplit_once(':') else {
            return Self {
                host: addr.to_string(),
                port: TLS_PORT,
                tls: true,
            };
        };
        let (port, forced) = match port.strip_prefix('+') {
            Some(port) => (port, true),
            None => (port, false),
        };
        let port = port.parse().unwrap_or(TLS_PORT);
        Self {
            host: host.to_string(),
            port,
            tls: forced || port == TLS_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// A configured server name or an ad-hoc address.
    Connect { name: String, address: ServerAddress },
    Disconnect,
    ServerList,
    Join { channel: String, password: Option<String> },
    Part { channel: Option<String> },
    Nick { nick: String },
    Msg { target: String, text: String },
    Me { text: String },
    Notice { target: String, text: String },
    Quit { message: Option<String> },
    Help,
    Kick { channel: Option<String>, user: String, reason: Option<String> },
    Ban { channel: Option<String>, nick: String },
    Mode { target: String, modes: String },
    Op { channel: Option<String>, nick: String, grant: bool },
    Voice { channel: Option<String>, nick: String, grant: bool },
    Topic { text: String },
    Whois { nick: String },
    Who { target: String },
    Away { message: Option<String> },
    Raw { command: String },
    List,
    Notify { nicks: Option<String> },
    Unnotify { nick: String },
    Ctcp { target: String, command: String },
    DccSend { nick: String, path: String },
    DccGet { port: u16, id: u32, resume: Option<u64> },
    DccClose { port: u16, id: u32 },
    DccList,
}

/// Cursor over the arguments of one command line.
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Words<'a> {
    fn new(args: &'a str) -> Self {
        Self { rest: args.trim_start() }
    }

    fn word(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (word, rest) = self.rest.split_once(' ').unwrap_or((self.rest, ""));
        self.rest = rest.trim_start();
        Some(word)
    }

    /// Everything not consumed yet, inner spacing intact.
    fn tail(&self) -> Option<&'a str> {
        let tail = self.rest.trim_end();
        (!tail.is_empty()).then_some(tail)
    }

    fn channel(&mut self) -> Option<String> {
        let before = self.rest;
        match self.word() {
            Some(word) if word.starts_with(['#', '&']) => Some(word.to_string()),
            _ => {
                self.rest = before;
                None
            }
        }
    }

    fn number<T: FromStr>(&mut self) -> Option<T> {
        self.word()?.parse().ok()
    }

    fn owned(&mut self) -> Option<String> {
        self.word().map(str::to_string)
    }

    fn owned_tail(&self) -> Option<String> {
        self.tail().map(str::to_string)
    }
}

impl UserCommand {
    /// `None` for plain text and for verbs nobody knows.
    pub fn parse(input: &str) -> Option<Self> {
        let body = input.trim().strip_prefix('/')?;
        let (verb, args) = body.split_once(' ').unwrap_or((body, ""));
        let verb = verb.to_ascii_lowercase();
        let mut args = Words::new(args);

        let command = match verb.as_str() {
            "server" | "connect" => {
                let name = args.tail()?;
                Self::Connect {
                    name: name.to_string(),
                    address: ServerAddress::from(name),
                }
            }
            "servers" => Self::ServerList,
            "disconnect" | "dc" => Self::Disconnect,
            "quit" | "exit" => Self::Quit {
                message: args.owned_tail(),
            },
            "help" | "h" => Self::Help,
            "raw" | "quote" => Self::Raw {
                command: args.owned_tail()?,
            },
            "join" | "j" => Self::Join {
                channel: args.owned()?,
                password: args.owned(),
            },
            "part" | "leave" => Self::Part {
                channel: args.channel(),
            },
            "topic" | "t" => Self::Topic {
                text: args.owned_tail().unwrap_or_default(),
            },
            "list" => Self::List,
            "msg" | "query" => Self::Msg {
                target: args.owned()?,
                text: args.owned_tail().unwrap_or_default(),
            },
            "notice" => Self::Notice {
                target: args.owned()?,
                text: args.owned_tail().unwrap_or_default(),
            },
            "me" => Self::Me {
                text: args.owned_tail().unwrap_or_default(),
            },
            "ctcp" => Self::Ctcp {
                target: args.owned()?,
                command: args.owned_tail().unwrap_or_else(|| "VERSION".to_string()),
            },
            "nick" => Self::Nick { nick: args.owned()? },
            "whois" | "wi" => Self::Whois { nick: args.owned()? },
            "who" => Self::Who { target: args.owned()? },
            "away" => Self::Away {
                message: args.owned_tail(),
            },
            "mode" => Self::Mode {
                target: args.owned()?,
                modes: args.owned_tail().unwrap_or_default(),
            },
            "kick" => Self::Kick {
                channel: args.channel(),
                user: args.owned()?,
                reason: args.owned_tail(),
            },
            "ban" => Self::Ban {
                channel: args.channel(),
                nick: args.owned()?,
            },
            "op" | "deop" => Self::Op {
                channel: args.channel(),
                nick: args.owned()?,
                grant: verb == "op",
            },
            "voice" | "devoice" => Self::Voice {
                channel: args.channel(),
                nick: args.owned()?,
                grant: verb == "voice",
            },
            "notify" => Self::Notify {
                nicks: args.owned_tail(),
            },
            "unnotify" => Self::Unnotify { nick: args.owned()? },
            "dcc" => Self::parse_dcc(&mut args)?,
            _ => return None,
        };
        Some(command)
    }

    /// `/dcc send <nick> <path>`, `/dcc get <port> <id> [resume]`,
    /// `/dcc close <port> <id>`, `/dcc list`.
    fn parse_dcc(args: &mut Words<'_>) -> Option<Self> {
        let sub = args.word()?.to_ascii_lowercase();
        match sub.as_str() {
            "list" | "ls" => Some(Self::DccList),
            "send" => Some(Self::DccSend {
                nick: args.owned()?,
                path: args.owned_tail()?,
            }),
            "get" | "accept" => {
                let port = args.number()?;
                let id = args.number()?;
                let resume = match args.word() {
                    Some(position) => Some(position.parse().ok()?),
                    None => None,
                };
                Some(Self::DccGet { port, id, resume })
            }
            "close" | "cancel" => Some(Self::DccClose {
                port: args.number()?,
                id: args.number()?,
            }),
            _ => None,
        }
    }
}

pub const HELP: &str = "\
/server <name|host[:[+]port]>  connect
/disconnect                    drop the connection
/servers                       list configured servers
/join <#chan> [key]            /part [#chan]
/msg <target> <text>           /me <text>   /notice <target> <text>
/nick <nick>  /whois <nick>  /who <target>  /away [msg]  /list
/topic <text>  /mode <target> <modes>
/op /deop /voice /devoice [#chan] <nick>
/kick [#chan] <nick> [reason]  /ban [#chan] <nick>
/notify [nick,nick]  /unnotify <nick>
/ctcp <target> [command]
/dcc send <nick> <path> | get <port> <id> [resume] | close <port> <id> | list
/raw <line>  /quit [msg]";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<UserCommand> {
        UserCommand::parse(input)
    }

    fn address(input: &str) -> ServerAddress {
        ServerAddress::from(input)
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("/frobnicate"), None);
        assert_eq!(parse("/"), None);
    }

    #[test]
    fn test_join_with_key() {
        assert_eq!(
            parse("/JOIN #rust sekrit"),
            Some(UserCommand::Join {
                channel: "#rust".to_string(),
                password: Some("sekrit".to_string())
            })
        );
        assert_eq!(
            parse("/j  rust"),
            Some(UserCommand::Join { channel: "rust".to_string(), password: None })
        );
        assert_eq!(parse("/join"), None);
    }

    #[test]
    fn test_part_only_takes_a_channel() {
        assert_eq!(parse("/part"), Some(UserCommand::Part { channel: None }));
        assert_eq!(parse("/part bye all"), Some(UserCommand::Part { channel: None }));
        assert_eq!(
            parse("/leave &local"),
            Some(UserCommand::Part { channel: Some("&local".to_string()) })
        );
    }

    #[test]
    fn test_text_keeps_inner_spacing() {
        assert_eq!(
            parse("/msg alice hi  there "),
            Some(UserCommand::Msg { target: "alice".to_string(), text: "hi  there".to_string() })
        );
        assert_eq!(parse("/me waves"), Some(UserCommand::Me { text: "waves".to_string() }));
        assert_eq!(
            parse("/notice bob"),
            Some(UserCommand::Notice { target: "bob".to_string(), text: String::new() })
        );
    }

    #[test]
    fn test_kick_with_and_without_channel() {
        assert_eq!(
            parse("/kick #rust bob spamming links"),
            Some(UserCommand::Kick {
                channel: Some("#rust".to_string()),
                user: "bob".to_string(),
                reason: Some("spamming links".to_string())
            })
        );
        assert_eq!(
            parse("/kick bob"),
            Some(UserCommand::Kick { channel: None, user: "bob".to_string(), reason: None })
        );
        assert_eq!(parse("/kick #rust"), None);
    }

    #[test]
    fn test_grant_and_revoke() {
        assert_eq!(
            parse("/deop #rust bob"),
            Some(UserCommand::Op { channel: Some("#rust".to_string()), nick: "bob".to_string(), grant: false })
        );
        assert_eq!(
            parse("/VOICE bob"),
            Some(UserCommand::Voice { channel: None, nick: "bob".to_string(), grant: true })
        );
        assert_eq!(
            parse("/devoice bob"),
            Some(UserCommand::Voice { channel: None, nick: "bob".to_string(), grant: false })
        );
        assert_eq!(
            parse("/ban #rust bob"),
            Some(UserCommand::Ban { channel: Some("#rust".to_string()), nick: "bob".to_string() })
        );
    }

    #[test]
    fn test_optional_messages() {
        assert_eq!(parse("/away"), Some(UserCommand::Away { message: None }));
        assert_eq!(
            parse("/away gone fishing"),
            Some(UserCommand::Away { message: Some("gone fishing".to_string()) })
        );
        assert_eq!(parse("/quit"), Some(UserCommand::Quit { message: None }));
        assert_eq!(parse("/raw"), None);
        assert_eq!(
            parse("/quote PRIVMSG x :y"),
            Some(UserCommand::Raw { command: "PRIVMSG x :y".to_string() })
        );
        assert_eq!(
            parse("/ctcp bob"),
            Some(UserCommand::Ctcp { target: "bob".to_string(), command: "VERSION".to_string() })
        );
    }

    #[test]
    fn test_notify() {
        assert_eq!(parse("/notify"), Some(UserCommand::Notify { nicks: None }));
        assert_eq!(
            parse("/notify alice,bob"),
            Some(UserCommand::Notify { nicks: Some("alice,bob".to_string()) })
        );
        assert_eq!(parse("/unnotify alice"), Some(UserCommand::Unnotify { nick: "alice".to_string() }));
    }

    #[test]
    fn test_dcc_subcommands() {
        assert_eq!(
            parse("/dcc send bob /tmp/my file.txt"),
            Some(UserCommand::DccSend { nick: "bob".to_string(), path: "/tmp/my file.txt".to_string() })
        );
        assert_eq!(parse("/dcc send bob"), None);
        assert_eq!(parse("/dcc get 5000 3"), Some(UserCommand::DccGet { port: 5000, id: 3, resume: None }));
        assert_eq!(
            parse("/dcc accept 0 3 1024"),
            Some(UserCommand::DccGet { port: 0, id: 3, resume: Some(1024) })
        );
        assert_eq!(parse("/dcc get 0 x"), None);
        assert_eq!(parse("/dcc get 0 3 soon"), None);
        assert_eq!(parse("/dcc close 5000 3"), Some(UserCommand::DccClose { port: 5000, id: 3 }));
        assert_eq!(parse("/dcc LS"), Some(UserCommand::DccList));
    }

    #[test]
    fn test_server_address_forms() {
        assert_eq!(
            address("irc.example.org"),
            ServerAddress { host: "irc.example.org".to_string(), port: 6697, tls: true }
        );
        assert_eq!(
            address("irc.example.org:6667"),
            ServerAddress { host: "irc.example.org".to_string(), port: 6667, tls: false }
        );
        assert_eq!(
            address("irc.example.org:+7000"),
            ServerAddress { host: "irc.example.org".to_string(), port: 7000, tls: true }
        );
        assert_eq!(
            parse("/server libera"),
            Some(UserCommand::Connect { name: "libera".to_string(), address: address("libera") })
        );
    }
}

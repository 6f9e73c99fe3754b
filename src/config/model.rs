//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML. Every field has a
//! default so an empty (or missing) file still yields a working setup.

use serde::{Deserialize, Serialize};

use super::nickname::generate_nickname;
use crate::engine::session::ConnectParams;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub flood: FloodConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub ctcp: CtcpConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub dcc: DccConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// The parts of the configuration the session engine consumes.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            flood: self.flood.clone(),
            presence: self.presence.clone(),
            ctcp: self.ctcp.clone(),
            connection: self.connection.clone(),
            dcc: self.dcc.clone(),
        }
    }

    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Engine tuning handed to [`crate::engine::Session::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub flood: FloodConfig,
    pub presence: PresenceConfig,
    pub ctcp: CtcpConfig,
    pub connection: ConnectionConfig,
    pub dcc: DccConfig,
}

/// Configuration for a single IRC server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// User-facing label (e.g. `"libera"`).
    pub name: String,
    /// Hostname or IP address of the IRC server.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub quit_message: Option<String>,
    /// Nicknames whose presence is polled while connected.
    #[serde(default)]
    pub notify: Vec<String>,
}

impl ServerConfig {
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            server: self.host.clone(),
            port: self.port,
            password: self.password.clone().filter(|p| !p.is_empty()),
            nick: self.nickname.clone(),
            user: self
                .username
                .clone()
                .unwrap_or_else(|| self.nickname.to_lowercase()),
            realname: self
                .realname
                .clone()
                .unwrap_or_else(|| self.nickname.clone()),
            tls: self.tls,
        }
    }
}

/// Send pacing. The defaults follow the usual ircd flood heuristics; none
/// of them is mandated by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloodConfig {
    #[serde(default = "default_max_budget")]
    pub max_budget: i32,
    #[serde(default = "default_one")]
    pub replenish_per_tick: i32,
    #[serde(default = "default_bytes_per_weight")]
    pub bytes_per_weight: usize,
    /// PRIVMSG / NOTICE.
    #[serde(default)]
    pub chat_weight: i32,
    /// TOPIC / KICK / MODE / ISON / WHO.
    #[serde(default = "default_query_weight")]
    pub query_weight: i32,
    #[serde(default = "default_whois_weight")]
    pub whois_weight: i32,
    #[serde(default = "default_one")]
    pub default_weight: i32,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            max_budget: default_max_budget(),
            replenish_per_tick: 1,
            bytes_per_weight: default_bytes_per_weight(),
            chat_weight: 0,
            query_weight: default_query_weight(),
            whois_weight: default_whois_weight(),
            default_weight: 1,
        }
    }
}

/// Contact presence polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u32,
    /// Delay of the first poll after registration.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u32,
    /// Follow up online contacts with WHO (and WHOIS when away).
    #[serde(default = "default_true")]
    pub refine_away: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            initial_delay_secs: default_initial_delay(),
            refine_away: true,
        }
    }
}

/// CTCP auto-reply settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtcpConfig {
    /// Replies allowed per window; further requests are swallowed.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_request_interval")]
    pub request_interval_secs: u32,
    #[serde(default = "default_true")]
    pub reply_version: bool,
    #[serde(default = "default_true")]
    pub reply_ping: bool,
    #[serde(default = "default_true")]
    pub reply_time: bool,
    #[serde(default = "default_version_string")]
    pub version_string: String,
}

impl Default for CtcpConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            request_interval_secs: default_request_interval(),
            reply_version: true,
            reply_ping: true,
            reply_time: true,
            version_string: default_version_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// The transport closes the connection after this long without traffic.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Longest line written, CRLF excluded. Longer messages are folded.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            max_line_len: default_max_line_len(),
            charset: default_charset(),
            accept_invalid_certs: false,
        }
    }
}

/// DCC negotiation settings. Payload transfer is the owner's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DccConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub reject_private_ips: bool,
    #[serde(default = "default_resume_timeout")]
    pub resume_timeout_secs: u64,
    #[serde(default = "default_passive_timeout")]
    pub passive_timeout_secs: u64,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            reject_private_ips: false,
            resume_timeout_secs: default_resume_timeout(),
            passive_timeout_secs: default_passive_timeout(),
        }
    }
}

/// Diagnostics and raw traffic logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write every raw line sent and received to daily files.
    #[serde(default)]
    pub traffic: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            traffic: false,
            log_dir: default_log_dir(),
        }
    }
}

fn default_nickname() -> String {
    generate_nickname()
}
fn default_port() -> u16 {
    6697
}
fn default_true() -> bool {
    true
}
fn default_one() -> i32 {
    1
}
fn default_max_budget() -> i32 {
    10
}
fn default_bytes_per_weight() -> usize {
    100
}
fn default_query_weight() -> i32 {
    2
}
fn default_whois_weight() -> i32 {
    3
}
fn default_poll_interval() -> u32 {
    30
}
fn default_initial_delay() -> u32 {
    5
}
fn default_max_requests() -> u32 {
    3
}
fn default_request_interval() -> u32 {
    10
}
fn default_version_string() -> String {
    concat!("ircsession ", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_idle_timeout() -> u64 {
    5 * 60
}
fn default_max_line_len() -> usize {
    crate::irc::message::MAX_LINE_LEN
}
fn default_charset() -> String {
    "utf-8".to_string()
}
fn default_max_file_size() -> u64 {
    500 * 1024 * 1024 // 500 MB
}
fn default_resume_timeout() -> u64 {
    15
}
fn default_passive_timeout() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> String {
    "~/.local/share/ircsession/logs".to_string()
}

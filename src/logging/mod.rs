//! Diagnostics setup and raw traffic logging.
//!
//! When traffic logging is enabled, every line sent to or received from a
//! server is appended to a daily file named `<server>_<date>.log` in the
//! configured log directory (default: `~/.local/share/ircsession/logs/`).

use crate::config::LoggingConfig;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// Writes raw protocol lines to per-server daily log files.
///
/// File handles are cached per file name; a file that cannot be opened is
/// reported once and then skipped until the date rolls over.
pub struct TrafficLogger {
    enabled: bool,
    log_dir: PathBuf,
    file_handles: HashMap<String, Option<File>>,
}

impl TrafficLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.traffic,
            log_dir: expand_home(&config.log_dir),
            file_handles: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_line(&mut self, server: &str, direction: Direction, line: &str) {
        if !self.enabled {
            return;
        }

        let now = chrono::Local::now();
        let filename = format!("{}_{}.log", safe_name(server), now.format("%Y-%m-%d"));
        let marker = match direction {
            Direction::Sent => ">>",
            Direction::Received => "<<",
        };

        let log_dir = &self.log_dir;
        let handle = self.file_handles.entry(filename).or_insert_with_key(|filename| {
            match open_log(log_dir, filename) {
                Ok(file) => Some(file),
                Err(err) => {
                    warn!(file = %filename, %err, "cannot open traffic log");
                    None
                }
            }
        });

        if let Some(file) = handle {
            let _ = writeln!(file, "[{}] {} {}", now.format("%H:%M:%S"), marker, line.trim_end());
        }
    }
}

fn open_log(dir: &Path, filename: &str) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(filename))
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, traffic: bool) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            traffic,
            log_dir: dir.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_lines_go_to_daily_server_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TrafficLogger::new(&config(dir.path(), true));
        logger.log_line("irc.libera.chat", Direction::Sent, "NICK crab\r\n");
        logger.log_line("irc.libera.chat", Direction::Received, "PING :x");

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = dir.path().join(format!("irc.libera.chat_{}.log", date));
        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(">> NICK crab"));
        assert!(lines[1].ends_with("<< PING :x"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TrafficLogger::new(&config(dir.path(), false));
        logger.log_line("server", Direction::Sent, "QUIT");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_server_name_is_sanitized() {
        assert_eq!(safe_name("irc/evil:6697"), "irc_evil_6697");
    }

    #[test]
    fn test_home_expansion() {
        assert_eq!(expand_home("/var/log/irc"), PathBuf::from("/var/log/irc"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/logs"), home.join("logs"));
        }
    }
}

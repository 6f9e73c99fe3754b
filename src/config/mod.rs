pub mod model;
pub mod nickname;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use model::{
    AppConfig, ConnectionConfig, CtcpConfig, DccConfig, FloodConfig, LoggingConfig,
    PresenceConfig, ServerConfig, SessionConfig,
};

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircsession")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.flood.max_budget, 10);
        assert_eq!(config.presence.poll_interval_secs, 30);
        assert_eq!(config.connection.idle_timeout_secs, 300);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[flood]
max_budget = 4

[[servers]]
name = "libera"
host = "irc.libera.chat"
nickname = "crab"
notify = ["alice", "bob"]
"#
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.flood.max_budget, 4);
        assert_eq!(config.flood.whois_weight, 3);

        let server = config.server("Libera").unwrap();
        assert_eq!(server.port, 6697);
        assert!(server.tls);
        assert_eq!(server.notify, ["alice", "bob"]);

        let params = server.connect_params();
        assert_eq!(params.nick, "crab");
        assert_eq!(params.user, "crab");
        assert_eq!(params.realname, "crab");
        assert!(params.password.is_none());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[flood\nmax_budget = ").unwrap();
        let err = load_config_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}

//! Configuration for the control-plane binary: one TOML file describing
//! every managed server, ambient event/plugin-runtime tuning knobs, and
//! logging settings (SPEC_FULL §2.1).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

fn default_subscriber_queue_capacity() -> usize {
    1000
}

fn default_command_wait_seconds() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_read_from_start() -> bool {
    false
}

fn default_poll_interval_seconds() -> u64 {
    5
}

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub events: EventSettings,
    #[serde(default)]
    pub rcon: RconSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// One managed Squad server: its RCON endpoint and (optional) log source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub rcon_password: String,
    #[serde(default)]
    pub log_source: Option<LogSourceConfig>,
}

/// Which of the three `LogSource` implementations to start for a server,
/// and its connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogSourceConfig {
    Local {
        path: PathBuf,
        #[serde(default = "default_read_from_start")]
        read_from_start: bool,
    },
    Sftp {
        host: String,
        port: u16,
        username: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        key_path: Option<PathBuf>,
        #[serde(default)]
        key_passphrase: Option<String>,
        remote_path: String,
        #[serde(default = "default_read_from_start")]
        read_from_start: bool,
        #[serde(default = "default_poll_interval_seconds")]
        poll_interval_seconds: u64,
    },
    Ftp {
        host: String,
        port: u16,
        username: String,
        password: String,
        remote_path: String,
        #[serde(default = "default_read_from_start")]
        read_from_start: bool,
        #[serde(default = "default_poll_interval_seconds")]
        poll_interval_seconds: u64,
    },
}

/// Event Manager tuning (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

/// RCON Manager tuning (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconSettings {
    #[serde(default = "default_command_wait_seconds")]
    pub command_wait_seconds: u64,
}

impl Default for RconSettings {
    fn default() -> Self {
        Self {
            command_wait_seconds: default_command_wait_seconds(),
        }
    }
}

/// Logging configuration, mirroring the teacher's `LoggingSettings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file. If the file doesn't exist, a
    /// default (empty-servers) configuration file is created in its place.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!(path = %path.display(), "created default configuration file");
            Ok(default_config)
        }
    }

    /// Validates cross-field invariants that serde's `#[serde(default)]`
    /// attributes can't express: unique server ids, non-empty addresses.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level: {}. must be one of: {valid_levels:?}",
                self.logging.level
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.id) {
                return Err(format!("duplicate server id: {}", server.id));
            }
            if server.address.parse::<std::net::SocketAddr>().is_err() {
                return Err(format!("invalid rcon address for server `{}`: {}", server.name, server.address));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn duplicate_server_ids_are_rejected() {
        let id = Uuid::new_v4();
        let server = |name: &str| ServerConfig {
            id,
            name: name.to_string(),
            address: "127.0.0.1:21114".to_string(),
            rcon_password: "pw".to_string(),
            log_source: None,
        };
        let config = AppConfig {
            servers: vec![server("a"), server("b")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("duplicate server id"));
    }

    #[test]
    fn invalid_rcon_address_is_rejected() {
        let config = AppConfig {
            servers: vec![ServerConfig {
                id: Uuid::new_v4(),
                name: "main".to_string(),
                address: "not-an-address".to_string(),
                rcon_password: "pw".to_string(),
                log_source: None,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn loading_a_missing_file_creates_a_default_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(!path.exists());

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());
        assert!(config.servers.is_empty());
    }

    #[tokio::test]
    async fn loading_an_existing_file_round_trips() {
        let toml_content = r#"
[[servers]]
id = "00000000-0000-0000-0000-000000000001"
name = "Main"
address = "127.0.0.1:21114"
rcon_password = "secret"

[servers.log_source]
type = "local"
path = "/var/log/squad/SquadGame.log"

[logging]
level = "debug"
json_format = true
"#;
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "Main");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(matches!(config.servers[0].log_source, Some(LogSourceConfig::Local { .. })));
    }
}

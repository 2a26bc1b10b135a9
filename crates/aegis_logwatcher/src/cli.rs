//! Command-line flags for the log-watcher binary (spec.md §6's
//! "Log-watcher CLI"). Every flag has an environment-variable equivalent
//! via clap's `env` attribute, matching the `LOGWATCHER_*` names spec.md
//! lists.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum SourceType {
    Local,
    Sftp,
    Ftp,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "aegis_logwatcher", version, about = "Squad Aegis standalone gRPC log relay")]
pub struct CliArgs {
    #[arg(long, env = "LOGWATCHER_SOURCE_TYPE", value_enum)]
    pub source_type: SourceType,

    /// Local log file path. Required when `--source-type=local`.
    #[arg(long, env = "LOGWATCHER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Remote host. Required for `sftp`/`ftp`.
    #[arg(long, env = "LOGWATCHER_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "LOGWATCHER_REMOTE_PORT")]
    pub remote_port: Option<u16>,

    #[arg(long, env = "LOGWATCHER_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "LOGWATCHER_PASSWORD")]
    pub password: Option<String>,

    /// SFTP private key path; mutually exclusive with `--password` for sftp.
    #[arg(long, env = "LOGWATCHER_KEY_PATH")]
    pub key_path: Option<PathBuf>,

    #[arg(long, env = "LOGWATCHER_REMOTE_PATH")]
    pub remote_path: Option<String>,

    /// How often to poll the source for new bytes, e.g. `5s`, `500ms`.
    #[arg(long, env = "LOGWATCHER_POLL_FREQUENCY", default_value = "5s", value_parser = parse_duration)]
    pub poll_frequency: Duration,

    /// Port the gRPC server listens on.
    #[arg(long, env = "LOGWATCHER_PORT", default_value_t = 31135)]
    pub port: u16,

    /// Bearer token every `StreamLogs`/`StreamEvents` call must present.
    #[arg(long, env = "LOGWATCHER_AUTH_TOKEN")]
    pub auth_token: String,

    #[arg(long, env = "LOGWATCHER_READ_FROM_START", default_value_t = false)]
    pub read_from_start: bool,

    #[arg(long, env = "LOGWATCHER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOGWATCHER_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parses `"5s"`, `"500ms"`, or a bare integer (seconds) into a [`Duration`].
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.parse().map(Duration::from_millis).map_err(|e| e.to_string());
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return secs.parse().map(Duration::from_secs).map_err(|e| e.to_string());
    }
    raw.parse().map(Duration::from_secs).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_and_milliseconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    }
}

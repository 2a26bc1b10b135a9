//! Builds the configured [`aegis_logs::LogSource`] from CLI flags.

use std::sync::Arc;

use aegis_logs::source::sftp::SftpAuth;
use aegis_logs::{FtpSource, LocalTailSource, LogSource, SftpSource};

use crate::cli::{CliArgs, SourceType};
use crate::error::LogwatcherError;

pub fn build_source(args: &CliArgs) -> Result<Arc<dyn LogSource>, LogwatcherError> {
    match args.source_type {
        SourceType::Local => {
            let path = args
                .log_file
                .clone()
                .ok_or_else(|| LogwatcherError::Config("--log-file is required for --source-type=local".into()))?;
            Ok(Arc::new(LocalTailSource::new(path, args.read_from_start)))
        }
        SourceType::Sftp => {
            let host = require(&args.host, "--host")?;
            let port = args.remote_port.unwrap_or(22);
            let username = require(&args.username, "--username")?;
            let remote_path = require(&args.remote_path, "--remote-path")?;
            let auth = match &args.key_path {
                Some(path) => SftpAuth::PrivateKey { path: path.clone(), passphrase: args.password.clone() },
                None => SftpAuth::Password(require(&args.password, "--password or --key-path")?),
            };
            Ok(Arc::new(
                SftpSource::new(host, port, username, auth, remote_path, args.read_from_start).with_poll_interval(args.poll_frequency),
            ))
        }
        SourceType::Ftp => {
            let host = require(&args.host, "--host")?;
            let port = args.remote_port.unwrap_or(21);
            let username = require(&args.username, "--username")?;
            let password = require(&args.password, "--password")?;
            let remote_path = require(&args.remote_path, "--remote-path")?;
            Ok(Arc::new(
                FtpSource::new(host, port, username, password, remote_path, args.read_from_start).with_poll_interval(args.poll_frequency),
            ))
        }
    }
}

fn require(value: &Option<String>, flag: &str) -> Result<String, LogwatcherError> {
    value.clone().ok_or_else(|| LogwatcherError::Config(format!("{flag} is required")))
}

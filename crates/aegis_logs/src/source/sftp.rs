//! SFTP log polling (spec.md §4.4): holds an SSH+SFTP session to a remote
//! host and polls the remote file's size every `poll_interval`, streaming
//! any bytes appended since `lastPos`. `ssh2` is blocking, so the session
//! lives on a dedicated blocking thread.

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::Session;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{split_lines, InitialPosition, LogSource};
use crate::error::LogSourceError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum SftpAuth {
    Password(String),
    PrivateKey { path: std::path::PathBuf, passphrase: Option<String> },
}

pub struct SftpSource {
    host: String,
    port: u16,
    username: String,
    auth: SftpAuth,
    remote_path: String,
    initial_position: InitialPosition,
    poll_interval: Duration,
}

impl SftpSource {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        auth: SftpAuth,
        remote_path: impl Into<String>,
        read_from_start: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth,
            remote_path: remote_path.into(),
            initial_position: InitialPosition::from_read_from_start(read_from_start),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn connect_session(&self) -> Result<Session, LogSourceError> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| LogSourceError::Transient(format!("tcp connect to {}:{}: {e}", self.host, self.port)))?;
        let mut session = Session::new().map_err(|e| LogSourceError::Transient(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| LogSourceError::Transient(e.to_string()))?;

        match &self.auth {
            SftpAuth::Password(password) => session
                .userauth_password(&self.username, password)
                .map_err(|e| LogSourceError::AuthFailed(e.to_string()))?,
            SftpAuth::PrivateKey { path, passphrase } => session
                .userauth_pubkey_file(&self.username, None, path, passphrase.as_deref())
                .map_err(|e| LogSourceError::AuthFailed(e.to_string()))?,
        }

        if !session.authenticated() {
            return Err(LogSourceError::AuthFailed("SFTP server rejected credentials".into()));
        }
        Ok(session)
    }
}

#[async_trait]
impl LogSource for SftpSource {
    async fn watch(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, LogSourceError> {
        // Fail fast on config/auth errors before handing back a channel,
        // per spec.md §4.4's "fatal" classification.
        let session = self.connect_session()?;
        drop(session);

        let (tx, rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let auth = self.auth.clone();
        let remote_path = self.remote_path.clone();
        let initial_position = self.initial_position;
        let poll_interval = self.poll_interval;

        tokio::task::spawn_blocking(move || {
            let source = SftpSource {
                host,
                port,
                username,
                auth,
                remote_path,
                initial_position,
                poll_interval,
            };
            run_poll_loop(&source, tx, cancel);
        });

        Ok(rx)
    }
}

fn run_poll_loop(source: &SftpSource, tx: mpsc::Sender<String>, cancel: CancellationToken) {
    let mut backoff = INITIAL_BACKOFF;
    let mut carry = String::new();
    let mut last_pos: u64 = 0;
    let mut have_position = false;

    'reconnect: loop {
        if cancel.is_cancelled() {
            return;
        }
        let session = match source.connect_session() {
            Ok(s) => s,
            Err(LogSourceError::AuthFailed(_)) | Err(LogSourceError::ConfigInvalid(_)) => return,
            Err(_) => {
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };
        let sftp = match session.sftp() {
            Ok(s) => s,
            Err(_) => {
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let stat = match sftp.stat(std::path::Path::new(&source.remote_path)) {
                Ok(s) => s,
                Err(_) => {
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue 'reconnect;
                }
            };
            let size = stat.size.unwrap_or(0);

            if !have_position {
                last_pos = match source.initial_position {
                    InitialPosition::Start => 0,
                    InitialPosition::CurrentEnd => size,
                };
                have_position = true;
            }

            if size < last_pos {
                last_pos = 0;
            }

            if size > last_pos {
                match sftp.open(std::path::Path::new(&source.remote_path)) {
                    Ok(mut remote_file) => {
                        use std::io::Seek;
                        if remote_file.seek(std::io::SeekFrom::Start(last_pos)).is_ok() {
                            let to_read = (size - last_pos) as usize;
                            let mut buf = vec![0u8; to_read];
                            match remote_file.read(&mut buf) {
                                Ok(n) => {
                                    last_pos += n as u64;
                                    let text = String::from_utf8_lossy(&buf[..n]);
                                    for line in split_lines(&mut carry, &text) {
                                        if tx.blocking_send(line).is_err() {
                                            return;
                                        }
                                    }
                                }
                                Err(e) => warn!(remote_path = %source.remote_path, error = %e, "sftp source: read failed"),
                            }
                        }
                    }
                    Err(_) => {
                        std::thread::sleep(backoff);
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue 'reconnect;
                    }
                }
            }

            std::thread::sleep(source.poll_interval);
        }
    }
}

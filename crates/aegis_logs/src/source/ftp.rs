//! FTP log polling (spec.md §4.4): analogous to the SFTP source but
//! speaks plain FTP (`SIZE` + `REST` + `RETR`) via `suppaftp`'s async
//! client.

use std::time::Duration;

use async_trait::async_trait;
use suppaftp::AsyncFtpStream;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{split_lines, InitialPosition, LogSource};
use crate::error::LogSourceError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const CHANNEL_CAPACITY: usize = 1024;

pub struct FtpSource {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_path: String,
    initial_position: InitialPosition,
    poll_interval: Duration,
}

impl FtpSource {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        remote_path: impl Into<String>,
        read_from_start: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            remote_path: remote_path.into(),
            initial_position: InitialPosition::from_read_from_start(read_from_start),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn connect(&self) -> Result<AsyncFtpStream, LogSourceError> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = AsyncFtpStream::connect(&addr)
            .await
            .map_err(|e| LogSourceError::Transient(format!("ftp connect to {addr}: {e}")))?;
        stream
            .login(&self.username, &self.password)
            .await
            .map_err(|e| LogSourceError::AuthFailed(e.to_string()))?;
        Ok(stream)
    }
}

#[async_trait]
impl LogSource for FtpSource {
    async fn watch(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, LogSourceError> {
        // Fail fast on config/auth errors before handing back a channel.
        let mut probe = self.connect().await?;
        let _ = probe.quit().await;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let password = self.password.clone();
        let remote_path = self.remote_path.clone();
        let initial_position = self.initial_position;
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let source = FtpSource {
                host,
                port,
                username,
                password,
                remote_path,
                initial_position,
                poll_interval,
            };
            run_poll_loop(&source, tx, cancel).await;
        });

        Ok(rx)
    }
}

async fn run_poll_loop(source: &FtpSource, tx: mpsc::Sender<String>, cancel: CancellationToken) {
    let mut backoff = INITIAL_BACKOFF;
    let mut carry = String::new();
    let mut last_pos: u64 = 0;
    let mut have_position = false;

    'reconnect: loop {
        if cancel.is_cancelled() {
            return;
        }
        let mut stream = match source.connect().await {
            Ok(s) => s,
            Err(LogSourceError::AuthFailed(_)) | Err(LogSourceError::ConfigInvalid(_)) => return,
            Err(_) => {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.cancelled() => return,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;

        loop {
            if cancel.is_cancelled() {
                let _ = stream.quit().await;
                return;
            }

            let size = match stream.size(&source.remote_path).await {
                Ok(s) => s as u64,
                Err(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue 'reconnect;
                }
            };

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
                let result: Result<(), String> = async {
                    stream
                        .resume_transfer(last_pos as usize)
                        .await
                        .map_err(|e| e.to_string())?;
                    let mut reader = stream
                        .retr_as_stream(&source.remote_path)
                        .await
                        .map_err(|e| e.to_string())?;
                    let mut buf = Vec::with_capacity((size - last_pos) as usize);
                    reader.read_to_end(&mut buf).await.map_err(|e| e.to_string())?;
                    stream
                        .finalize_retr_stream(reader)
                        .await
                        .map_err(|e| e.to_string())?;
                    last_pos += buf.len() as u64;
                    let text = String::from_utf8_lossy(&buf);
                    for line in split_lines(&mut carry, &text) {
                        if tx.send(line).await.is_err() {
                            return Err("consumer gone".to_string());
                        }
                    }
                    Ok(())
                }
                .await;

                if let Err(e) = result {
                    warn!(remote_path = %source.remote_path, error = %e, "ftp source: transfer failed");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue 'reconnect;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }
}

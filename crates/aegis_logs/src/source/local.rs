//! Local-file tailing with reopen-on-rotate and polling (spec.md §4.4).
//! Polling is required because some filesystems don't deliver
//! inotify-like events for the game's log.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{split_lines, InitialPosition, LogSource};
use crate::error::LogSourceError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

pub struct LocalTailSource {
    path: PathBuf,
    initial_position: InitialPosition,
    poll_interval: Duration,
}

impl LocalTailSource {
    pub fn new(path: impl Into<PathBuf>, read_from_start: bool) -> Self {
        Self {
            path: path.into(),
            initial_position: InitialPosition::from_read_from_start(read_from_start),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl LogSource for LocalTailSource {
    async fn watch(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, LogSourceError> {
        let path = self.path.clone();
        let poll_interval = self.poll_interval;

        let mut file = File::open(&path)
            .await
            .map_err(|e| LogSourceError::ConfigInvalid(format!("cannot open {}: {e}", path.display())))?;
        let mut last_pos = match self.initial_position {
            InitialPosition::Start => 0,
            InitialPosition::CurrentEnd => file.metadata().await.map(|m| m.len()).unwrap_or(0),
        };
        file.seek(SeekFrom::Start(last_pos)).await.ok();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut carry = String::new();
            let mut buf = vec![0u8; READ_CHUNK_SIZE];

            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let metadata_len = match tokio::fs::metadata(&path).await {
                    Ok(m) => m.len(),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "local log source: stat failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(poll_interval) => continue,
                            _ = cancel.cancelled() => return,
                        }
                    }
                };

                if metadata_len < last_pos {
                    debug!(path = %path.display(), "local log source: file shrank, treating as rotation");
                    last_pos = 0;
                    match File::open(&path).await {
                        Ok(f) => file = f,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "local log source: reopen after rotation failed");
                            tokio::select! {
                                _ = tokio::time::sleep(poll_interval) => continue,
                                _ = cancel.cancelled() => return,
                            }
                        }
                    }
                }

                if metadata_len > last_pos {
                    if file.seek(SeekFrom::Start(last_pos)).await.is_err() {
                        tokio::select! {
                            _ = tokio::time::sleep(poll_interval) => continue,
                            _ = cancel.cancelled() => return,
                        }
                    }
                    match file.read(&mut buf).await {
                        Ok(0) => {}
                        Ok(n) => {
                            last_pos += n as u64;
                            let text = String::from_utf8_lossy(&buf[..n]);
                            for line in split_lines(&mut carry, &text) {
                                if tx.send(line).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "local log source: read failed");
                        }
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;

    fn with_poll(path: impl Into<PathBuf>, read_from_start: bool) -> LocalTailSource {
        LocalTailSource::new(path, read_from_start).with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn tails_lines_appended_after_watch_starts() {
        let file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file.as_file(), "before").unwrap();

        let source = with_poll(file.path(), false);
        let cancel = CancellationToken::new();
        let mut rx = source.watch(cancel.clone()).await.unwrap();

        writeln!(file.as_file(), "line one").unwrap();
        writeln!(file.as_file(), "line two").unwrap();

        assert_eq!(rx.recv().await.unwrap(), "line one");
        assert_eq!(rx.recv().await.unwrap(), "line two");
        cancel.cancel();
    }

    #[tokio::test]
    async fn read_from_start_replays_existing_content() {
        let file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file.as_file(), "already here").unwrap();

        let source = with_poll(file.path(), true);
        let cancel = CancellationToken::new();
        let mut rx = source.watch(cancel.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "already here");
        cancel.cancel();
    }

    #[tokio::test]
    async fn shrinking_file_is_treated_as_rotation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stale line that will be truncated away").unwrap();

        let source = with_poll(file.path(), false);
        let cancel = CancellationToken::new();
        let mut rx = source.watch(cancel.clone()).await.unwrap();

        file.as_file_mut().set_len(0).unwrap();
        file.as_file_mut().sync_all().unwrap();
        writeln!(file, "post-rotation line").unwrap();

        assert_eq!(rx.recv().await.unwrap(), "post-rotation line");
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancellation_closes_the_receiver() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = with_poll(file.path(), false);
        let cancel = CancellationToken::new();
        let mut rx = source.watch(cancel.clone()).await.unwrap();

        cancel.cancel();
        assert_eq!(rx.recv().await, None);
    }
}

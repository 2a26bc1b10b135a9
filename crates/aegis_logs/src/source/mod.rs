//! The polymorphic log source contract (spec.md §4.4): `watch(cancel) →
//! lazy sequence of line-strings`. All three implementations normalize
//! CRLF to LF, suppress trailing empty lines, and terminate only on
//! cancellation or a fatal (configuration/authentication) error.

pub mod ftp;
pub mod local;
pub mod sftp;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LogSourceError;

/// A source of newline-delimited log lines.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Starts watching, pushing lines onto an internal channel. Returns a
    /// receiver the caller drains; the receiver closes when `cancel` fires
    /// or a fatal error occurs (which is also reported once via the
    /// returned receiver closing without a trailing error — transient
    /// errors never reach the consumer per spec.md §4.4).
    async fn watch(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<String>, LogSourceError>;
}

/// Whether tailing should start at the beginning of the file or at its
/// current end (spec.md §4.4's tailing default).
#[derive(Debug, Clone, Copy)]
pub enum InitialPosition {
    Start,
    CurrentEnd,
}

impl InitialPosition {
    pub fn from_read_from_start(read_from_start: bool) -> Self {
        if read_from_start {
            InitialPosition::Start
        } else {
            InitialPosition::CurrentEnd
        }
    }
}

/// Splits a raw byte chunk into complete, CRLF-normalized lines plus any
/// trailing partial line to carry over to the next read.
pub(crate) fn split_lines(carry: &mut String, chunk: &str) -> Vec<String> {
    carry.push_str(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = carry.find('\n') {
        let mut line: String = carry.drain(..=pos).collect();
        if line.ends_with('\n') {
            line.pop();
        }
        if line.ends_with('\r') {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

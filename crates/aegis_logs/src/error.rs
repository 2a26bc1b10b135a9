//! Log-pipeline error kinds, mapping onto spec.md §7's taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogSourceError {
    /// `kConfigInvalid`: bad construction parameters (missing credentials,
    /// unreadable path). Fatal; the watch sequence terminates.
    #[error("invalid log source configuration: {0}")]
    ConfigInvalid(String),

    /// `kAuthFailed`: SFTP/FTP credentials were rejected. Fatal.
    #[error("log source authentication failed: {0}")]
    AuthFailed(String),

    /// Transient I/O error. Never surfaced to the line consumer; the
    /// source silently reconnects with backoff and resumes at the last
    /// known position.
    #[error("transient log source I/O error: {0}")]
    Transient(String),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogwatcherError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    LogSource(#[from] aegis_logs::LogSourceError),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

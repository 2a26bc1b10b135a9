//! Top-level error type for `main`, wrapping every subsystem's own
//! `thiserror` enum (SPEC_FULL §2.1, spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AegisError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Rcon(#[from] aegis_rcon::RconError),

    #[error(transparent)]
    LogSource(#[from] aegis_logs::LogSourceError),

    #[error(transparent)]
    Plugin(#[from] aegis_plugins::PluginError),

    #[error(transparent)]
    Persistence(#[from] aegis_persistence::PersistenceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

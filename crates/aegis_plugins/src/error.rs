//! Plugin runtime error kinds, mapping onto spec.md §7's taxonomy.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PluginError {
    /// `kConfigInvalid`: failed required-field/type validation.
    #[error("invalid plugin configuration: {0}")]
    ConfigInvalid(String),

    /// `kMultipleInstancesForbidden`: a second instance of a
    /// single-instance plugin was requested for the same server.
    #[error("plugin {0} does not allow multiple instances on this server")]
    MultipleInstancesForbidden(String),

    /// `kDependencyNotRunning`: a required connector isn't `running`.
    #[error("required connector {0} is not running")]
    DependencyNotRunning(String),

    /// One-shot registration collision.
    #[error("plugin or connector id {0} is already registered")]
    DuplicateRegistration(String),

    /// `kPluginPanic`: caught by the panic firewall.
    #[error("plugin panicked: {0}")]
    PluginPanic(String),

    /// `kUnauthorized`: a capability call outside the instance's scope,
    /// or an RCON/SQL command outside its allow-list.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no plugin instance {0}")]
    InstanceNotFound(Uuid),

    #[error("no plugin definition registered for id {0}")]
    UnknownPluginId(String),

    #[error("no connector registered for id {0}")]
    UnknownConnectorId(String),

    #[error("command {0} not found on this plugin")]
    UnknownCommand(String),

    #[error(transparent)]
    Rcon(#[from] aegis_rcon::RconError),

    #[error(transparent)]
    Persistence(#[from] aegis_persistence::PersistenceError),
}

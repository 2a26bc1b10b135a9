//! Plugin/connector registries, lifecycle state machine, capability
//! APIs, and the command interface (spec.md §4.7).

mod capabilities;
mod command;
mod error;
mod lifecycle;
mod plugin;
mod registry;

pub use capabilities::{
    CapabilityBundle, ConnectorAPI, DatabaseAPI, EventAPI, LogAPI, PlayerInfo, RconAPI, ServerAPI, ServerInfo, SquadInfo,
};
pub use command::{Command, CommandResult, CommandStatus};
pub use error::PluginError;
pub use lifecycle::{ConnectorEntry, InstanceStatus, PluginInstanceView, PluginManager, UNCHANGED_SENTINEL};
pub use plugin::{Connector, ConnectorFactory, Plugin, PluginFactory, PluginWrapper};
pub use registry::{ConfigSchema, ConnectorDefinition, ConnectorRegistry, PluginDefinition, PluginRegistry};

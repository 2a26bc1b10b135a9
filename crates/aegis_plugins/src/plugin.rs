//! The `Plugin`/`PluginFactory` traits and the panic-firewall wrapper
//! every plugin instance is dispatched through.
//!
//! Grounded on `universal_plugin_system::plugin::PluginWrapper`, which
//! converts `std::panic::catch_unwind` failures into a typed error.
//! Since every method here is already async (no `block_on` bridge
//! needed), the wrapper calls `futures::FutureExt::catch_unwind`
//! directly on each method's future instead.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::capabilities::CapabilityBundle;
use crate::command::{Command, CommandResult, CommandStatus};
use crate::error::PluginError;
use aegis_events::Event;

/// A plugin instance's business logic. One `Box<dyn Plugin>` backs each
/// `PluginInstance` in `lifecycle::PluginManager`.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    /// Called once during `starting`, after config validation, with the
    /// instance's capability bundle.
    async fn initialize(&mut self, config: Value, apis: CapabilityBundle) -> Result<(), PluginError>;

    /// Called after `initialize` only if the plugin definition marks
    /// `long_running`.
    async fn start(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called during `stopping`, bounded by a 30s timeout by the caller.
    async fn stop(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn update_config(&mut self, config: Value) -> Result<(), PluginError> {
        let _ = config;
        Ok(())
    }

    /// Called once per dispatched event this instance is subscribed to.
    async fn handle_event(&mut self, event: Event) -> Result<(), PluginError> {
        let _ = event;
        Ok(())
    }

    fn get_commands(&self) -> Vec<Command> {
        Vec::new()
    }

    async fn execute_command(&mut self, command_id: &str, params: Value) -> Result<CommandResult, PluginError> {
        let _ = params;
        Err(PluginError::UnknownCommand(command_id.to_string()))
    }

    async fn get_command_execution_status(&mut self, execution_id: &str) -> Result<CommandStatus, PluginError> {
        Err(PluginError::UnknownCommand(execution_id.to_string()))
    }
}

/// Constructs fresh `Plugin` instances for a registered plugin-type id.
pub trait PluginFactory: Send + Sync {
    fn create(&self) -> Box<dyn Plugin>;
}

fn describe_panic(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "plugin panicked with a non-string payload".to_string()
    }
}

/// Wraps a `Plugin` so every method dispatch is caught at the panic
/// boundary and converted to `PluginError::PluginPanic` instead of
/// unwinding into the runtime's dispatch task.
pub struct PluginWrapper<T: Plugin> {
    inner: T,
}

impl<T: Plugin> PluginWrapper<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Plugin> Plugin for PluginWrapper<T> {
    fn name(&self) -> &str {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.name())) {
            Ok(name) => name,
            Err(_) => "unknown-plugin",
        }
    }

    fn version(&self) -> &str {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.version())) {
            Ok(version) => version,
            Err(_) => "unknown-version",
        }
    }

    async fn initialize(&mut self, config: Value, apis: CapabilityBundle) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.initialize(config, apis))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    async fn start(&mut self) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.start())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    async fn stop(&mut self) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.stop())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    async fn update_config(&mut self, config: Value) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.update_config(config))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    async fn handle_event(&mut self, event: Event) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.handle_event(event))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    fn get_commands(&self) -> Vec<Command> {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.get_commands())) {
            Ok(commands) => commands,
            Err(_) => Vec::new(),
        }
    }

    async fn execute_command(&mut self, command_id: &str, params: Value) -> Result<CommandResult, PluginError> {
        AssertUnwindSafe(self.inner.execute_command(command_id, params))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }

    async fn get_command_execution_status(&mut self, execution_id: &str) -> Result<CommandStatus, PluginError> {
        AssertUnwindSafe(self.inner.get_command_execution_status(execution_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PluginError::PluginPanic(describe_panic(panic))))
    }
}

/// Process-global counterpart to `Plugin`: connectors expose a typed API
/// handle (via `as_any`) that plugins reach through `ConnectorAPI`.
#[async_trait]
pub trait Connector: Send + Sync {
    fn connector_id(&self) -> &str;

    async fn initialize(&mut self, config: Value) -> Result<(), PluginError>;

    async fn stop(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn update_config(&mut self, config: Value) -> Result<(), PluginError> {
        let _ = config;
        Ok(())
    }

    /// Downcast target for `ConnectorAPI::get_connector::<T>()`.
    fn as_any(&self) -> &dyn Any;
}

pub trait ConnectorFactory: Send + Sync {
    fn create(&self) -> Box<dyn Connector>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingPlugin;

    #[async_trait]
    impl Plugin for PanickingPlugin {
        fn name(&self) -> &str {
            "panicker"
        }
        fn version(&self) -> &str {
            "0.0.0"
        }
        async fn initialize(&mut self, _config: Value, _apis: CapabilityBundle) -> Result<(), PluginError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn wrapper_converts_panic_to_plugin_panic_error() {
        let mut wrapped = PluginWrapper::new(PanickingPlugin);
        let err = wrapped
            .initialize(Value::Null, CapabilityBundle::test_stub())
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::PluginPanic(_)));
    }
}

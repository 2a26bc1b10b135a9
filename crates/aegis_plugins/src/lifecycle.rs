//! The plugin/connector lifecycle state machine (spec.md §4.7.2) and
//! event routing (spec.md §4.7.3).
//!
//! The instance table is a `DashMap` (teacher's idiom for the event
//! subscriber/connection tables elsewhere in this workspace); each entry
//! is a cheaply-`Clone`-able handle so a lookup never holds the map's
//! shard lock across an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use aegis_events::{Event, EventFilter, EventManager, EventPayload, EventType, ServerId, SystemEventKind, SystemPayload};
use aegis_persistence::{ConnectorRow, PersistenceAdapter, PluginInstanceRow};
use aegis_rcon::RconManager;

use crate::capabilities::CapabilityBundle;
use crate::error::PluginError;
use crate::plugin::{Connector, Plugin, PluginWrapper};
use crate::registry::{ConnectorRegistry, PluginRegistry};

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Value a caller passes for a sensitive config field in `update_config`
/// to mean "leave it as whatever was persisted," rather than re-sending
/// (and re-logging) the secret.
pub const UNCHANGED_SENTINEL: &str = "__unchanged__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
    Disabled,
}

pub struct ConnectorEntry {
    pub status: InstanceStatus,
    pub connector: Arc<TokioMutex<Box<dyn Connector>>>,
}

#[derive(Clone)]
struct PluginInstanceHandle {
    id: Uuid,
    server_id: ServerId,
    plugin_id: String,
    config: Arc<StdRwLock<Value>>,
    status: Arc<StdRwLock<InstanceStatus>>,
    enabled: Arc<AtomicBool>,
    plugin: Arc<TokioMutex<Box<dyn Plugin>>>,
    cancel: CancellationToken,
    last_error: Arc<StdRwLock<Option<String>>>,
    created_at: DateTime<Utc>,
    updated_at: Arc<StdRwLock<DateTime<Utc>>>,
    subscribed_event_types: Vec<String>,
}

impl PluginInstanceHandle {
    fn status(&self) -> InstanceStatus {
        *self.status.read().unwrap()
    }

    fn set_status(&self, status: InstanceStatus) {
        *self.status.write().unwrap() = status;
        *self.updated_at.write().unwrap() = Utc::now();
    }

    fn record_error(&self, error: impl ToString) {
        *self.last_error.write().unwrap() = Some(error.to_string());
    }
}

/// Snapshot returned to callers inspecting an instance (e.g. a future
/// admin API), decoupled from the internal handle's lock types.
#[derive(Debug, Clone)]
pub struct PluginInstanceView {
    pub id: Uuid,
    pub server_id: ServerId,
    pub plugin_id: String,
    pub status: InstanceStatus,
    pub enabled: bool,
    pub last_error: Option<String>,
}

/// Owns every plugin instance and connector instance in the process, and
/// the single Event Manager subscriber that routes events to plugins.
pub struct PluginManager {
    plugin_registry: Arc<PluginRegistry>,
    connector_registry: Arc<ConnectorRegistry>,
    persistence: Arc<dyn PersistenceAdapter>,
    events: Arc<EventManager>,
    rcon: Arc<RconManager>,
    instances: DashMap<Uuid, PluginInstanceHandle>,
    connectors: Arc<DashMap<String, ConnectorEntry>>,
    server_descriptors: DashMap<ServerId, (String, String)>,
    router: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PluginManager {
    pub fn new(
        plugin_registry: Arc<PluginRegistry>,
        connector_registry: Arc<ConnectorRegistry>,
        persistence: Arc<dyn PersistenceAdapter>,
        events: Arc<EventManager>,
        rcon: Arc<RconManager>,
    ) -> Self {
        Self {
            plugin_registry,
            connector_registry,
            persistence,
            events,
            rcon,
            instances: DashMap::new(),
            connectors: Arc::new(DashMap::new()),
            server_descriptors: DashMap::new(),
            router: std::sync::Mutex::new(None),
        }
    }

    /// Registers the `(name, address)` a `ServerAPI` reports for
    /// `server_id`. Instances created before this is called fall back to
    /// the server id's string form.
    pub fn register_server(&self, server_id: ServerId, name: impl Into<String>, address: impl Into<String>) {
        self.server_descriptors.insert(server_id, (name.into(), address.into()));
    }

    /// Starts the event-routing subscriber (spec.md §4.7.3): one
    /// unfiltered subscription, capacity 1000, dispatching to matching
    /// plugin instances on a fresh task per `(event, plugin)` pair.
    pub fn start(self: &Arc<Self>) {
        let manager = self.clone();
        let handle = tokio::spawn(manager.run_router());
        *self.router.lock().unwrap() = Some(handle);
    }

    /// Stops the event-routing subscriber. Does not touch running plugin
    /// instances or connectors — see [`Self::shutdown_all`] for the full
    /// graceful-shutdown sequence.
    pub fn shutdown(&self) {
        if let Some(handle) = self.router.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Full graceful shutdown (spec.md §6): stop routing new events, run
    /// every running plugin instance's `stop()` hook, then every running
    /// connector's `stop()` hook. Plugin instances are stopped before
    /// connectors so a plugin's shutdown logic can still reach a
    /// connector it depends on.
    pub async fn shutdown_all(&self) {
        self.shutdown();

        let instances: Vec<PluginInstanceHandle> = self.instances.iter().map(|e| e.value().clone()).collect();
        for handle in instances {
            if handle.status() == InstanceStatus::Running {
                self.stop_instance_handle(&handle).await;
            }
        }

        let connector_ids: Vec<String> = self.connectors.iter().map(|e| e.key().clone()).collect();
        for connector_id in connector_ids {
            let entry = self.connectors.get(&connector_id).map(|e| (e.status, e.connector.clone()));
            let Some((status, connector)) = entry else { continue };
            if status != InstanceStatus::Running {
                continue;
            }
            match tokio::time::timeout(STOP_TIMEOUT, connector.lock().await.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(connector_id, error = %e, "connector stop() returned an error during shutdown"),
                Err(_) => tracing::warn!(connector_id, "connector stop() exceeded the 30s shutdown deadline"),
            }
            if let Some(mut entry) = self.connectors.get_mut(&connector_id) {
                entry.status = InstanceStatus::Stopped;
            }
        }
    }

    async fn run_router(self: Arc<Self>) {
        let mut subscriber = self.events.subscribe(EventFilter::all(), 1000);
        while let Some(event) = subscriber.receiver.recv().await {
            self.clone().dispatch_event(event);
        }
    }

    fn dispatch_event(self: Arc<Self>, event: Event) {
        let discriminant = event.event_type.discriminant();
        for entry in self.instances.iter() {
            let inst = entry.value().clone();
            if inst.server_id != event.server_id || inst.status() != InstanceStatus::Running {
                continue;
            }
            if !inst.subscribed_event_types.iter().any(|t| t == "*" || *t == discriminant) {
                continue;
            }
            let manager = self.clone();
            let event_clone = event.clone();
            tokio::spawn(async move { manager.dispatch_to_instance(inst, event_clone).await });
        }
    }

    async fn dispatch_to_instance(self: Arc<Self>, inst: PluginInstanceHandle, event: Event) {
        let result = inst.plugin.lock().await.handle_event(event).await;
        if let Err(e) = result {
            inst.set_status(InstanceStatus::Error);
            inst.record_error(&e);
            self.events.publish(Event::new(
                inst.server_id,
                EventType::System(SystemEventKind::PluginInstanceError),
                EventPayload::System(SystemPayload {
                    message: format!("plugin {} instance {} failed handling an event: {e}", inst.plugin_id, inst.id),
                }),
            ));
        }
    }

    fn capability_bundle(&self, handle: &PluginInstanceHandle) -> CapabilityBundle {
        let (name, address) = self
            .server_descriptors
            .get(&handle.server_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| (handle.server_id.to_string(), String::new()));
        CapabilityBundle {
            server: crate::capabilities::ServerAPI::new(handle.server_id, name, address, self.rcon.clone()),
            database: crate::capabilities::DatabaseAPI::new(handle.id, self.persistence.clone()),
            rcon: crate::capabilities::RconAPI::new(handle.server_id, self.rcon.clone()),
            event: crate::capabilities::EventAPI::new(handle.server_id, self.events.clone()),
            connector: crate::capabilities::ConnectorAPI::new(self.connectors.clone()),
            log: crate::capabilities::LogAPI::new(handle.server_id, handle.id),
        }
    }

    /// `create(pluginID, serverID, config)` (spec.md §4.7.2).
    pub async fn create(&self, plugin_id: &str, server_id: ServerId, config: Value) -> Result<Uuid, PluginError> {
        let definition = self.plugin_registry.get(plugin_id)?;
        definition.config_schema.validate(&config, true)?;

        if !definition.allow_multiple_instances {
            let exists = self
                .instances
                .iter()
                .any(|e| e.plugin_id == plugin_id && e.server_id == server_id);
            if exists {
                return Err(PluginError::MultipleInstancesForbidden(plugin_id.to_string()));
            }
        }

        for required in &definition.required_connectors {
            let running = self
                .connectors
                .get(required)
                .map(|e| e.status == InstanceStatus::Running)
                .unwrap_or(false);
            if !running {
                return Err(PluginError::DependencyNotRunning(required.clone()));
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let handle = PluginInstanceHandle {
            id,
            server_id,
            plugin_id: plugin_id.to_string(),
            config: Arc::new(StdRwLock::new(config.clone())),
            status: Arc::new(StdRwLock::new(InstanceStatus::Stopped)),
            enabled: Arc::new(AtomicBool::new(true)),
            plugin: Arc::new(TokioMutex::new(Box::new(PluginWrapper::new(BoxedPlugin(definition.factory.create()))))),
            cancel: CancellationToken::new(),
            last_error: Arc::new(StdRwLock::new(None)),
            created_at: now,
            updated_at: Arc::new(StdRwLock::new(now)),
            subscribed_event_types: definition.subscribed_event_types.clone(),
        };

        self.persistence
            .upsert_plugin_instance(PluginInstanceRow {
                id,
                server_id,
                plugin_id: plugin_id.to_string(),
                config,
                enabled: true,
                notes: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.instances.insert(id, handle.clone());
        self.initialize_instance(&handle).await;
        Ok(id)
    }

    async fn initialize_instance(&self, handle: &PluginInstanceHandle) {
        let Ok(definition) = self.plugin_registry.get(&handle.plugin_id) else {
            handle.set_status(InstanceStatus::Error);
            handle.record_error("plugin definition no longer registered");
            return;
        };

        handle.set_status(InstanceStatus::Starting);
        let apis = self.capability_bundle(handle);
        let config = handle.config.read().unwrap().clone();

        let mut plugin = handle.plugin.lock().await;
        if let Err(e) = plugin.initialize(config, apis).await {
            drop(plugin);
            handle.set_status(InstanceStatus::Error);
            handle.record_error(e);
            return;
        }

        if definition.long_running {
            if let Err(e) = plugin.start().await {
                drop(plugin);
                handle.set_status(InstanceStatus::Error);
                handle.record_error(e);
                return;
            }
        }
        drop(plugin);
        handle.set_status(InstanceStatus::Running);
    }

    async fn stop_instance_handle(&self, handle: &PluginInstanceHandle) {
        handle.set_status(InstanceStatus::Stopping);
        handle.cancel.cancel();

        let plugin = handle.plugin.clone();
        let result = tokio::time::timeout(STOP_TIMEOUT, async move { plugin.lock().await.stop().await }).await;
        match result {
            Ok(Ok(())) => handle.set_status(InstanceStatus::Stopped),
            Ok(Err(e)) => {
                handle.set_status(InstanceStatus::Error);
                handle.record_error(e);
            }
            Err(_) => {
                handle.record_error("plugin stop() exceeded the 30s shutdown deadline");
                handle.set_status(InstanceStatus::Stopped);
            }
        }
    }

    pub async fn stop(&self, id: Uuid) -> Result<(), PluginError> {
        let handle = self.instances.get(&id).map(|e| e.value().clone()).ok_or(PluginError::InstanceNotFound(id))?;
        self.stop_instance_handle(&handle).await;
        Ok(())
    }

    pub async fn update_config(&self, id: Uuid, new_config: Value) -> Result<(), PluginError> {
        let handle = self.instances.get(&id).map(|e| e.value().clone()).ok_or(PluginError::InstanceNotFound(id))?;
        let definition = self.plugin_registry.get(&handle.plugin_id)?;

        let prior = handle.config.read().unwrap().clone();
        let merged = merge_sensitive_fields(&prior, &new_config, &definition.config_schema.sensitive_fields);
        definition.config_schema.validate(&merged, false)?;

        handle.plugin.lock().await.update_config(merged.clone()).await?;
        *handle.config.write().unwrap() = merged.clone();
        *handle.updated_at.write().unwrap() = Utc::now();

        self.persistence
            .upsert_plugin_instance(PluginInstanceRow {
                id,
                server_id: handle.server_id,
                plugin_id: handle.plugin_id.clone(),
                config: merged,
                enabled: handle.enabled.load(Ordering::Relaxed),
                notes: None,
                created_at: handle.created_at,
                updated_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    pub async fn enable(&self, id: Uuid) -> Result<(), PluginError> {
        let handle = self.instances.get(&id).map(|e| e.value().clone()).ok_or(PluginError::InstanceNotFound(id))?;
        let definition = self.plugin_registry.get(&handle.plugin_id)?;

        for required in &definition.required_connectors {
            let running = self
                .connectors
                .get(required)
                .map(|e| e.status == InstanceStatus::Running)
                .unwrap_or(false);
            if !running {
                return Err(PluginError::DependencyNotRunning(required.clone()));
            }
        }

        handle.enabled.store(true, Ordering::Relaxed);
        self.initialize_instance(&handle).await;
        Ok(())
    }

    pub async fn disable(&self, id: Uuid) -> Result<(), PluginError> {
        let handle = self.instances.get(&id).map(|e| e.value().clone()).ok_or(PluginError::InstanceNotFound(id))?;
        self.stop_instance_handle(&handle).await;
        handle.enabled.store(false, Ordering::Relaxed);
        handle.set_status(InstanceStatus::Disabled);
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), PluginError> {
        if let Some((_, handle)) = self.instances.remove(&id) {
            self.stop_instance_handle(&handle).await;
        }
        self.persistence.delete_plugin_instance(id).await?;
        Ok(())
    }

    pub fn view(&self, id: Uuid) -> Option<PluginInstanceView> {
        self.instances.get(&id).map(|e| PluginInstanceView {
            id: e.id,
            server_id: e.server_id,
            plugin_id: e.plugin_id.clone(),
            status: e.status(),
            enabled: e.enabled.load(Ordering::Relaxed),
            last_error: e.last_error.read().unwrap().clone(),
        })
    }

    pub fn instances_for_server(&self, server_id: ServerId) -> Vec<PluginInstanceView> {
        self.instances
            .iter()
            .filter(|e| e.server_id == server_id)
            .map(|e| PluginInstanceView {
                id: e.id,
                server_id: e.server_id,
                plugin_id: e.plugin_id.clone(),
                status: e.status(),
                enabled: e.enabled.load(Ordering::Relaxed),
                last_error: e.last_error.read().unwrap().clone(),
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Connectors
    // -----------------------------------------------------------------

    pub async fn create_connector(&self, connector_id: &str, config: Value) -> Result<(), PluginError> {
        let definition = self.connector_registry.get(connector_id)?;
        definition.config_schema.validate(&config, true)?;

        let mut connector = definition.factory.create();
        let status = match connector.initialize(config.clone()).await {
            Ok(()) => InstanceStatus::Running,
            Err(_) => InstanceStatus::Error,
        };

        let now = Utc::now();
        self.persistence
            .upsert_connector(ConnectorRow {
                id: Uuid::new_v4(),
                connector_id: connector_id.to_string(),
                config,
                enabled: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.connectors.insert(
            connector_id.to_string(),
            ConnectorEntry {
                status,
                connector: Arc::new(TokioMutex::new(connector)),
            },
        );
        Ok(())
    }

    /// Updates a connector's config, then restarts (stop, then a fresh
    /// init) every plugin instance whose `requiredConnectors` names it,
    /// sequentially per instance so no intermediate `running` is ever
    /// observed between the stop and the fresh start.
    pub async fn update_connector_config(&self, connector_id: &str, new_config: Value) -> Result<(), PluginError> {
        let definition = self.connector_registry.get(connector_id)?;
        definition.config_schema.validate(&new_config, false)?;

        let entry = self
            .connectors
            .get(connector_id)
            .map(|e| e.connector.clone())
            .ok_or_else(|| PluginError::UnknownConnectorId(connector_id.to_string()))?;
        entry.lock().await.update_config(new_config.clone()).await?;

        if let Some(mut e) = self.connectors.get_mut(connector_id) {
            e.status = InstanceStatus::Running;
        }

        let dependents: Vec<PluginInstanceHandle> = self
            .instances
            .iter()
            .filter(|e| {
                self.plugin_registry
                    .get(&e.plugin_id)
                    .map(|d| d.required_connectors.iter().any(|c| c == connector_id))
                    .unwrap_or(false)
            })
            .map(|e| e.value().clone())
            .collect();

        for handle in dependents {
            self.stop_instance_handle(&handle).await;
            self.initialize_instance(&handle).await;
        }
        Ok(())
    }

    pub fn connector_status(&self, connector_id: &str) -> Option<InstanceStatus> {
        self.connectors.get(connector_id).map(|e| e.status)
    }
}

fn merge_sensitive_fields(prior: &Value, incoming: &Value, sensitive_fields: &[String]) -> Value {
    let mut merged = incoming.clone();
    if let Some(obj) = merged.as_object_mut() {
        for field in sensitive_fields {
            let is_unchanged = obj.get(field).and_then(|v| v.as_str()) == Some(UNCHANGED_SENTINEL);
            if is_unchanged {
                if let Some(prior_value) = prior.get(field) {
                    obj.insert(field.clone(), prior_value.clone());
                }
            }
        }
    }
    merged
}

/// Adapts a `Box<dyn Plugin>` produced by a factory into a concrete
/// `Plugin` so it can be wrapped by `PluginWrapper<T>`, whose panic
/// firewall is written generically over `T: Plugin` rather than over
/// `Box<dyn Plugin>` directly.
struct BoxedPlugin(Box<dyn Plugin>);

#[async_trait::async_trait]
impl Plugin for BoxedPlugin {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn version(&self) -> &str {
        self.0.version()
    }
    async fn initialize(&mut self, config: Value, apis: CapabilityBundle) -> Result<(), PluginError> {
        self.0.initialize(config, apis).await
    }
    async fn start(&mut self) -> Result<(), PluginError> {
        self.0.start().await
    }
    async fn stop(&mut self) -> Result<(), PluginError> {
        self.0.stop().await
    }
    async fn update_config(&mut self, config: Value) -> Result<(), PluginError> {
        self.0.update_config(config).await
    }
    async fn handle_event(&mut self, event: Event) -> Result<(), PluginError> {
        self.0.handle_event(event).await
    }
    fn get_commands(&self) -> Vec<crate::command::Command> {
        self.0.get_commands()
    }
    async fn execute_command(&mut self, command_id: &str, params: Value) -> Result<crate::command::CommandResult, PluginError> {
        self.0.execute_command(command_id, params).await
    }
    async fn get_command_execution_status(&mut self, execution_id: &str) -> Result<crate::command::CommandStatus, PluginError> {
        self.0.get_command_execution_status(execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConfigSchema, ConnectorDefinition, PluginDefinition};
    use crate::plugin::{Connector, ConnectorFactory, PluginFactory};
    use aegis_persistence::InMemoryPersistence;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    struct CountingPlugin {
        init_count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            "counter"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn initialize(&mut self, _config: Value, _apis: CapabilityBundle) -> Result<(), PluginError> {
            self.init_count.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    struct CountingFactory {
        init_count: Arc<AtomicU32>,
    }

    impl PluginFactory for CountingFactory {
        fn create(&self) -> Box<dyn Plugin> {
            Box::new(CountingPlugin {
                init_count: self.init_count.clone(),
            })
        }
    }

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        fn connector_id(&self) -> &str {
            "stub"
        }
        async fn initialize(&mut self, _config: Value) -> Result<(), PluginError> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct StubConnectorFactory;
    impl ConnectorFactory for StubConnectorFactory {
        fn create(&self) -> Box<dyn Connector> {
            Box::new(StubConnector)
        }
    }

    fn test_manager(init_count: Arc<AtomicU32>) -> PluginManager {
        let plugin_registry = Arc::new(PluginRegistry::new());
        plugin_registry
            .register(PluginDefinition {
                plugin_id: "counter".into(),
                factory: Box::new(CountingFactory { init_count }),
                allow_multiple_instances: false,
                long_running: false,
                required_connectors: vec!["stub".into()],
                subscribed_event_types: vec!["*".into()],
                config_schema: ConfigSchema::default(),
            })
            .unwrap();

        let connector_registry = Arc::new(ConnectorRegistry::new());
        connector_registry
            .register(ConnectorDefinition {
                connector_id: "stub".into(),
                factory: Box::new(StubConnectorFactory),
                config_schema: ConfigSchema::default(),
            })
            .unwrap();

        let events = Arc::new(EventManager::new());
        PluginManager::new(
            plugin_registry,
            connector_registry,
            Arc::new(InMemoryPersistence::new()),
            events.clone(),
            Arc::new(RconManager::new(events)),
        )
    }

    #[tokio::test]
    async fn create_fails_without_required_connector_running() {
        let manager = test_manager(Arc::new(AtomicU32::new(0)));
        let err = manager.create("counter", ServerId::new(), serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, PluginError::DependencyNotRunning(_)));
    }

    #[tokio::test]
    async fn create_succeeds_once_connector_is_running_and_rejects_a_second_instance() {
        let manager = test_manager(Arc::new(AtomicU32::new(0)));
        manager.create_connector("stub", serde_json::json!({})).await.unwrap();

        let server_id = ServerId::new();
        let id = manager.create("counter", server_id, serde_json::json!({})).await.unwrap();
        assert_eq!(manager.view(id).unwrap().status, InstanceStatus::Running);

        let err = manager.create("counter", server_id, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, PluginError::MultipleInstancesForbidden(_)));
    }

    #[tokio::test]
    async fn shutdown_all_stops_running_instances_and_connectors() {
        let manager = test_manager(Arc::new(AtomicU32::new(0)));
        manager.create_connector("stub", serde_json::json!({})).await.unwrap();
        let id = manager.create("counter", ServerId::new(), serde_json::json!({})).await.unwrap();
        assert_eq!(manager.view(id).unwrap().status, InstanceStatus::Running);
        assert_eq!(manager.connector_status("stub"), Some(InstanceStatus::Running));

        manager.shutdown_all().await;

        assert_eq!(manager.view(id).unwrap().status, InstanceStatus::Stopped);
        assert_eq!(manager.connector_status("stub"), Some(InstanceStatus::Stopped));
    }

    #[tokio::test]
    async fn connector_config_update_restarts_dependent_instances() {
        let init_count = Arc::new(AtomicU32::new(0));
        let manager = test_manager(init_count.clone());
        manager.create_connector("stub", serde_json::json!({})).await.unwrap();
        let id = manager.create("counter", ServerId::new(), serde_json::json!({})).await.unwrap();
        assert_eq!(init_count.load(AtomicOrdering::SeqCst), 1);

        manager.update_connector_config("stub", serde_json::json!({})).await.unwrap();
        assert_eq!(init_count.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(manager.view(id).unwrap().status, InstanceStatus::Running);
    }
}

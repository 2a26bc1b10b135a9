//! The `PersistenceAdapter` trait (spec.md §6): opaque storage for the
//! plugin/connector lifecycle bootstrap and a plugin-private KV table.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::rows::{ConnectorRow, PluginInstanceRow};
use aegis_events::ServerId;

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn upsert_plugin_instance(&self, row: PluginInstanceRow) -> Result<(), PersistenceError>;
    async fn get_plugin_instance(&self, id: Uuid) -> Result<Option<PluginInstanceRow>, PersistenceError>;
    async fn list_plugin_instances(&self, server_id: Option<ServerId>) -> Result<Vec<PluginInstanceRow>, PersistenceError>;
    async fn delete_plugin_instance(&self, id: Uuid) -> Result<(), PersistenceError>;

    async fn upsert_connector(&self, row: ConnectorRow) -> Result<(), PersistenceError>;
    async fn get_connector(&self, id: Uuid) -> Result<Option<ConnectorRow>, PersistenceError>;
    async fn list_connectors(&self) -> Result<Vec<ConnectorRow>, PersistenceError>;
    async fn delete_connector(&self, id: Uuid) -> Result<(), PersistenceError>;

    /// `plugin_data(plugin_instance_id, key, value, timestamps)`, upsert
    /// semantics on write.
    async fn kv_get(&self, plugin_instance_id: Uuid, key: &str) -> Result<Option<Value>, PersistenceError>;
    async fn kv_set(&self, plugin_instance_id: Uuid, key: &str, value: Value) -> Result<(), PersistenceError>;
    async fn kv_delete_all(&self, plugin_instance_id: Uuid) -> Result<(), PersistenceError>;
}

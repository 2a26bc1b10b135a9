//! `DashMap`-backed default `PersistenceAdapter`. Adequate for a single
//! process instance; a real deployment swaps this for a SQL-backed
//! adapter without the rest of the crate noticing.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::adapter::PersistenceAdapter;
use crate::error::PersistenceError;
use crate::rows::{ConnectorRow, PluginInstanceRow};
use aegis_events::ServerId;

#[derive(Default)]
pub struct InMemoryPersistence {
    plugin_instances: DashMap<Uuid, PluginInstanceRow>,
    connectors: DashMap<Uuid, ConnectorRow>,
    plugin_data: DashMap<(Uuid, String), Value>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistence {
    async fn upsert_plugin_instance(&self, row: PluginInstanceRow) -> Result<(), PersistenceError> {
        self.plugin_instances.insert(row.id, row);
        Ok(())
    }

    async fn get_plugin_instance(&self, id: Uuid) -> Result<Option<PluginInstanceRow>, PersistenceError> {
        Ok(self.plugin_instances.get(&id).map(|r| r.clone()))
    }

    async fn list_plugin_instances(&self, server_id: Option<ServerId>) -> Result<Vec<PluginInstanceRow>, PersistenceError> {
        Ok(self
            .plugin_instances
            .iter()
            .filter(|e| match server_id {
                Some(sid) => e.server_id == sid,
                None => true,
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn delete_plugin_instance(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.plugin_instances.remove(&id);
        self.kv_delete_all(id).await
    }

    async fn upsert_connector(&self, row: ConnectorRow) -> Result<(), PersistenceError> {
        self.connectors.insert(row.id, row);
        Ok(())
    }

    async fn get_connector(&self, id: Uuid) -> Result<Option<ConnectorRow>, PersistenceError> {
        Ok(self.connectors.get(&id).map(|r| r.clone()))
    }

    async fn list_connectors(&self) -> Result<Vec<ConnectorRow>, PersistenceError> {
        Ok(self.connectors.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_connector(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.connectors.remove(&id);
        Ok(())
    }

    async fn kv_get(&self, plugin_instance_id: Uuid, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.plugin_data.get(&(plugin_instance_id, key.to_string())).map(|v| v.clone()))
    }

    async fn kv_set(&self, plugin_instance_id: Uuid, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.plugin_data.insert((plugin_instance_id, key.to_string()), value);
        Ok(())
    }

    async fn kv_delete_all(&self, plugin_instance_id: Uuid) -> Result<(), PersistenceError> {
        self.plugin_data.retain(|(id, _), _| *id != plugin_instance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_row(id: Uuid, server_id: ServerId) -> PluginInstanceRow {
        PluginInstanceRow {
            id,
            server_id,
            plugin_id: "greeter".into(),
            config: serde_json::json!({}),
            enabled: true,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = InMemoryPersistence::new();
        let id = Uuid::new_v4();
        let server_id = ServerId::new();
        store.upsert_plugin_instance(sample_row(id, server_id)).await.unwrap();
        let fetched = store.get_plugin_instance(id).await.unwrap().unwrap();
        assert_eq!(fetched.plugin_id, "greeter");
    }

    #[tokio::test]
    async fn delete_plugin_instance_clears_its_kv_data() {
        let store = InMemoryPersistence::new();
        let id = Uuid::new_v4();
        store.kv_set(id, "score", serde_json::json!(42)).await.unwrap();
        store.delete_plugin_instance(id).await.unwrap();
        assert!(store.kv_get(id, "score").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_plugin_instances_filters_by_server() {
        let store = InMemoryPersistence::new();
        let server_a = ServerId::new();
        let server_b = ServerId::new();
        store.upsert_plugin_instance(sample_row(Uuid::new_v4(), server_a)).await.unwrap();
        store.upsert_plugin_instance(sample_row(Uuid::new_v4(), server_b)).await.unwrap();
        let only_a = store.list_plugin_instances(Some(server_a)).await.unwrap();
        assert_eq!(only_a.len(), 1);
    }
}

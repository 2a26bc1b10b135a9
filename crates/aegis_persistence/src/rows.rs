//! Row shapes the lifecycle bootstrap reads and writes (spec.md §6).
//! Schema/migration is out of scope; these are the columns the core
//! actually depends on, opaque otherwise.

use aegis_events::ServerId;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PluginInstanceRow {
    pub id: Uuid,
    pub server_id: ServerId,
    pub plugin_id: String,
    pub config: Value,
    pub enabled: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConnectorRow {
    pub id: Uuid,
    pub connector_id: String,
    pub config: Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Plugin/connector definition registries (spec.md §4.7.1): one-shot
//! registration at process start, keyed by plugin-type/connector id.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::PluginError;
use crate::plugin::{ConnectorFactory, PluginFactory};

/// Required-field and sensitive-field validation for plugin/connector
/// config. Type checking beyond "is this key present and non-null" is
/// left to the plugin's own `initialize`/`update_config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    pub required_fields: Vec<String>,
    pub sensitive_fields: Vec<String>,
}

impl ConfigSchema {
    pub fn validate(&self, config: &Value, is_create: bool) -> Result<(), PluginError> {
        let obj = config
            .as_object()
            .ok_or_else(|| PluginError::ConfigInvalid("config must be a JSON object".into()))?;

        for field in &self.required_fields {
            if !obj.get(field).is_some_and(|v| !v.is_null()) {
                return Err(PluginError::ConfigInvalid(format!("missing required field `{field}`")));
            }
        }
        if is_create {
            for field in &self.sensitive_fields {
                if !obj.get(field).is_some_and(|v| !v.is_null()) {
                    return Err(PluginError::ConfigInvalid(format!(
                        "missing required sensitive field `{field}` on creation"
                    )));
                }
            }
        }
        Ok(())
    }
}

pub struct PluginDefinition {
    pub plugin_id: String,
    pub factory: Box<dyn PluginFactory>,
    pub allow_multiple_instances: bool,
    pub long_running: bool,
    pub required_connectors: Vec<String>,
    /// `"*"` subscribes to every event type.
    pub subscribed_event_types: Vec<String>,
    pub config_schema: ConfigSchema,
}

pub struct ConnectorDefinition {
    pub connector_id: String,
    pub factory: Box<dyn ConnectorFactory>,
    pub config_schema: ConfigSchema,
}

#[derive(Default)]
pub struct PluginRegistry {
    definitions: DashMap<String, Arc<PluginDefinition>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: PluginDefinition) -> Result<(), PluginError> {
        if self.definitions.contains_key(&definition.plugin_id) {
            return Err(PluginError::DuplicateRegistration(definition.plugin_id));
        }
        self.definitions.insert(definition.plugin_id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, plugin_id: &str) -> Result<Arc<PluginDefinition>, PluginError> {
        self.definitions
            .get(plugin_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| PluginError::UnknownPluginId(plugin_id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.definitions.iter().map(|e| e.key().clone()).collect()
    }
}

#[derive(Default)]
pub struct ConnectorRegistry {
    definitions: DashMap<String, Arc<ConnectorDefinition>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: ConnectorDefinition) -> Result<(), PluginError> {
        if self.definitions.contains_key(&definition.connector_id) {
            return Err(PluginError::DuplicateRegistration(definition.connector_id));
        }
        self.definitions
            .insert(definition.connector_id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, connector_id: &str) -> Result<Arc<ConnectorDefinition>, PluginError> {
        self.definitions
            .get(connector_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| PluginError::UnknownConnectorId(connector_id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.definitions.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;
    use async_trait::async_trait;

    struct NoopPlugin;

    #[async_trait]
    impl Plugin for NoopPlugin {
        fn name(&self) -> &str {
            "noop"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        async fn initialize(&mut self, _config: Value, _apis: crate::capabilities::CapabilityBundle) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct NoopFactory;
    impl PluginFactory for NoopFactory {
        fn create(&self) -> Box<dyn Plugin> {
            Box::new(NoopPlugin)
        }
    }

    fn definition(plugin_id: &str) -> PluginDefinition {
        PluginDefinition {
            plugin_id: plugin_id.to_string(),
            factory: Box::new(NoopFactory),
            allow_multiple_instances: false,
            long_running: false,
            required_connectors: Vec::new(),
            subscribed_event_types: vec!["*".to_string()],
            config_schema: ConfigSchema::default(),
        }
    }

    #[test]
    fn registering_the_same_id_twice_fails() {
        let registry = PluginRegistry::new();
        registry.register(definition("greeter")).unwrap();
        let err = registry.register(definition("greeter")).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateRegistration(_)));
    }

    #[test]
    fn config_schema_requires_sensitive_fields_only_on_create() {
        let schema = ConfigSchema {
            required_fields: vec!["enabled".into()],
            sensitive_fields: vec!["apiKey".into()],
        };
        let config = serde_json::json!({ "enabled": true });
        assert!(schema.validate(&config, true).is_err());
        assert!(schema.validate(&config, false).is_ok());
    }
}

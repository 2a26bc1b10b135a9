//! Plugin-exposed command interface (spec.md §4.7.5).

use serde_json::Value;

/// A user-executable command a plugin advertises via
/// [`crate::plugin::Plugin::get_commands`].
#[derive(Debug, Clone)]
pub struct Command {
    pub id: String,
    pub description: String,
    /// JSON schema for parameters, validated the same way as plugin config.
    pub params_schema: Value,
    pub is_async: bool,
}

/// Outcome of [`crate::plugin::Plugin::execute_command`]. Sync commands
/// resolve with `status` already `Completed`/`Failed`; async commands
/// return `Running` with an `execution_id` the caller polls via
/// `get_command_execution_status`.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub execution_id: Option<String>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn completed(output: Value) -> Self {
        Self {
            status: CommandStatus::Completed,
            execution_id: None,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failed,
            execution_id: None,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn running(execution_id: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Running,
            execution_id: Some(execution_id.into()),
            output: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Running,
    Completed,
    Failed,
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TaskId;
use super::task_function::DEFAULT_TASK_NAME;

/// One unit of work submitted by the coordinator. Consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub task_id: TaskId,
    pub data: Value,
}

impl Task {
    pub fn new(task_id: TaskId, name: Option<&str>, data: Value) -> Self {
        Self {
            name: name.map(str::to_string),
            task_id,
            data,
        }
    }

    /// Registry name this task resolves to.
    pub fn function_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_TASK_NAME)
    }
}

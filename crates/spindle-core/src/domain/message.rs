//! MessageValue - the single envelope carried in both directions.
//!
//! Exactly one field group is meant to be populated per message. When more
//! than one is present, the worker's classification order decides (see
//! `app::worker_loop`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{TaskId, WorkerId};
use super::options::KillBehavior;
use super::performance::{TaskPerformance, WorkerStatistics};
use super::task::Task;
use super::task_function::TaskFunctionProperties;
use crate::ports::ResponsePort;

/// Registry operation requested by the coordinator.
///
/// Unrecognised names are kept so the worker can answer with an error
/// instead of failing to decode the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskFunctionOperation {
    Add,
    Remove,
    Default,
    Unknown(String),
}

impl From<String> for TaskFunctionOperation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "add" => TaskFunctionOperation::Add,
            "remove" => TaskFunctionOperation::Remove,
            "default" => TaskFunctionOperation::Default,
            _ => TaskFunctionOperation::Unknown(s),
        }
    }
}

impl From<TaskFunctionOperation> for String {
    fn from(op: TaskFunctionOperation) -> Self {
        op.to_string()
    }
}

impl fmt::Display for TaskFunctionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFunctionOperation::Add => f.write_str("add"),
            TaskFunctionOperation::Remove => f.write_str("remove"),
            TaskFunctionOperation::Default => f.write_str("default"),
            TaskFunctionOperation::Unknown(op) => f.write_str(op),
        }
    }
}

/// Result of the kill handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillStatus {
    Success,
    Failure,
}

/// The `kill` field is overloaded by direction.
///
/// - pool→worker `true`: terminal kill
/// - worker→pool `"SOFT"`/`"HARD"`: idle kill-request
/// - worker→pool `"success"`/`"failure"`: kill handler outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KillMessage {
    Terminate(bool),
    Request(KillBehavior),
    Outcome(KillStatus),
}

/// Error payload for a failed task or registry operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerError {
    /// Task function name the error relates to.
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,

    // handshake / ready report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    /// Dedicated response channel; only meaningful in-process.
    #[serde(skip)]
    pub port: Option<ResponsePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_functions_properties: Option<Vec<TaskFunctionProperties>>,

    // control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<WorkerStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_active: Option<bool>,

    // registry operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_function_operation: Option<TaskFunctionOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_function_operation_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_function_properties: Option<TaskFunctionProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_function_source: Option<String>,

    // tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_performance: Option<TaskPerformance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_error: Option<WorkerError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill: Option<KillMessage>,
}

impl MessageValue {
    /// One-time channel setup sent by the coordinator.
    pub fn handshake(worker_id: WorkerId, port: Option<ResponsePort>) -> Self {
        Self {
            worker_id: Some(worker_id),
            ready: Some(false),
            port,
            ..Default::default()
        }
    }

    pub fn ready(ready: bool, properties: Vec<TaskFunctionProperties>) -> Self {
        Self {
            ready: Some(ready),
            task_functions_properties: Some(properties),
            ..Default::default()
        }
    }

    pub fn statistics(statistics: WorkerStatistics) -> Self {
        Self {
            statistics: Some(statistics),
            ..Default::default()
        }
    }

    pub fn check_active(enabled: bool) -> Self {
        Self {
            check_active: Some(enabled),
            ..Default::default()
        }
    }

    pub fn task(task: Task) -> Self {
        Self {
            task_id: Some(task.task_id),
            name: task.name,
            data: Some(task.data),
            ..Default::default()
        }
    }

    pub fn task_function_operation(
        operation: TaskFunctionOperation,
        properties: TaskFunctionProperties,
        source: Option<String>,
    ) -> Self {
        Self {
            task_function_operation: Some(operation),
            task_function_properties: Some(properties),
            task_function_source: source,
            ..Default::default()
        }
    }

    pub fn task_functions_properties(properties: Vec<TaskFunctionProperties>) -> Self {
        Self {
            task_functions_properties: Some(properties),
            ..Default::default()
        }
    }

    pub fn kill(kill: KillMessage) -> Self {
        Self {
            kill: Some(kill),
            ..Default::default()
        }
    }

    /// Terminal kill sent by the coordinator.
    pub fn terminate() -> Self {
        Self::kill(KillMessage::Terminate(true))
    }

    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn is_task(&self) -> bool {
        self.task_id.is_some()
    }

    /// The task carried by this envelope, if it is a task submission.
    pub fn into_task(self) -> Option<Task> {
        let task_id = self.task_id?;
        Some(Task {
            name: self.name,
            task_id,
            data: self.data.unwrap_or(Value::Null),
        })
    }
}

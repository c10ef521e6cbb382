//! Task functions: the executable units a worker can run by name.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name under which the default task function is always reachable.
pub const DEFAULT_TASK_NAME: &str = "default";

/// Fallback derived name for a single function that has no usable name.
pub(crate) const ANONYMOUS_TASK_NAME: &str = "fn1";

/// Outcome of one task function invocation. Errors are already string-formatted.
pub type TaskResult = Result<Value, String>;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type SyncFn = Arc<dyn Fn(Value) -> TaskResult + Send + Sync>;
type AsyncFn = Arc<dyn Fn(Value) -> BoxFuture<TaskResult> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum TaskFunctionKind {
    Sync(SyncFn),
    Async(AsyncFn),
}

/// A registered task function, either synchronous or asynchronous.
///
/// Both kinds take the task data by value and report errors as strings, so
/// the coordinator cannot tell them apart from the wire format.
#[derive(Clone)]
pub struct TaskFunction {
    kind: TaskFunctionKind,
    type_name: &'static str,
}

impl TaskFunction {
    /// Wrap a synchronous function. It runs to completion on the dispatcher turn.
    pub fn sync<F, E>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self {
            type_name: std::any::type_name::<F>(),
            kind: TaskFunctionKind::Sync(Arc::new(move |data| f(data).map_err(|e| e.to_string()))),
        }
    }

    /// Wrap an asynchronous function. It is spawned as a tracked tokio task.
    pub fn asynchronous<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self {
            type_name: std::any::type_name::<F>(),
            kind: TaskFunctionKind::Async(Arc::new(move |data| {
                let fut = f(data);
                Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
            })),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.kind, TaskFunctionKind::Async(_))
    }

    pub(crate) fn kind(&self) -> &TaskFunctionKind {
        &self.kind
    }

    /// Name used when a single function is registered without a record.
    ///
    /// Function items keep their own name (`crate::double` -> `double`);
    /// closures fall back to `fn1`.
    pub fn derived_name(&self) -> String {
        if self.type_name.contains("{{closure}}") {
            return ANONYMOUS_TASK_NAME.to_string();
        }
        let path = self.type_name.split('<').next().unwrap_or(self.type_name);
        match path.rsplit("::").next() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => ANONYMOUS_TASK_NAME.to_string(),
        }
    }
}

impl fmt::Debug for TaskFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFunction")
            .field("async", &self.is_async())
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Pool-side worker selection strategy a task function may ask for.
///
/// The worker only stores and reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerChoiceStrategy {
    RoundRobin,
    LeastUsed,
    LeastBusy,
    LeastElu,
    FairShare,
    WeightedRoundRobin,
    InterleavedWeightedRoundRobin,
}

/// A task function with its scheduling hints.
#[derive(Debug, Clone)]
pub struct TaskFunctionObject {
    pub task_function: TaskFunction,
    pub priority: Option<i64>,
    pub strategy: Option<WorkerChoiceStrategy>,
}

impl TaskFunctionObject {
    pub fn new(task_function: TaskFunction) -> Self {
        Self {
            task_function,
            priority: None,
            strategy: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_strategy(mut self, strategy: WorkerChoiceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn properties(&self, name: &str) -> TaskFunctionProperties {
        TaskFunctionProperties {
            name: name.to_string(),
            priority: self.priority,
            strategy: self.strategy,
        }
    }
}

impl From<TaskFunction> for TaskFunctionObject {
    fn from(task_function: TaskFunction) -> Self {
        Self::new(task_function)
    }
}

/// Serializable description of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFunctionProperties {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<WorkerChoiceStrategy>,
}

impl TaskFunctionProperties {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: None,
            strategy: None,
        }
    }
}

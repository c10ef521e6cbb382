//! Executor - 一つの task を実行して結果 envelope を作る
//!
//! Synchronous task functions run inline on the dispatcher turn. Asynchronous
//! ones are spawned, and their [`Completion`] is posted back on a channel the
//! dispatcher drains, so every task yields exactly one outbound message.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::task_function::TaskFunctionKind;
use crate::domain::{
    MessageValue, Task, TaskFunction, TaskId, TaskPerformance, TaskResult, WorkerError,
    WorkerStatistics,
};
use crate::error::SpindleError;
use crate::ports::Clock;

/// Performance bookkeeping started before a task function is invoked.
#[derive(Debug, Clone)]
pub(crate) struct TaskStart {
    name: String,
    start_timestamp: f64,
    started_at: Instant,
}

/// Outcome of a spawned task function, posted back to the dispatcher.
#[derive(Debug)]
pub(crate) struct Completion {
    task_id: TaskId,
    /// Original task data, kept for error reports.
    data: Value,
    start: TaskStart,
    outcome: TaskResult,
}

pub(crate) struct Executor {
    statistics: Option<WorkerStatistics>,
    clock: Arc<dyn Clock>,
    last_completed_at: Instant,
}

impl Executor {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            statistics: None,
            clock,
            last_completed_at: Instant::now(),
        }
    }

    pub(crate) fn set_statistics(&mut self, statistics: WorkerStatistics) {
        self.statistics = Some(statistics);
    }

    fn begin(&self, name: &str) -> Result<TaskStart, SpindleError> {
        if self.statistics.is_none() {
            return Err(SpindleError::StatisticsNotConfigured);
        }
        Ok(TaskStart {
            name: name.to_string(),
            start_timestamp: self.clock.now_millis(),
            started_at: Instant::now(),
        })
    }

    /// Run `task` with the function the registry resolved for it.
    ///
    /// Returns the outbound message when it is already known. `None` means
    /// the function was spawned and its [`Completion`] will arrive on
    /// `completions`.
    pub(crate) fn execute(
        &mut self,
        task: Task,
        function: Option<TaskFunction>,
        completions: &mpsc::UnboundedSender<Completion>,
    ) -> Option<MessageValue> {
        let name = task.function_name().to_string();
        let Task { task_id, data, .. } = task;

        let Some(function) = function else {
            let err = SpindleError::TaskFunctionNotFound(name.clone());
            return Some(error_message(task_id, name, err.to_string(), data));
        };
        let start = match self.begin(&name) {
            Ok(start) => start,
            Err(err) => return Some(error_message(task_id, name, err.to_string(), data)),
        };

        match function.kind() {
            TaskFunctionKind::Sync(f) => {
                let input = data.clone();
                let outcome = catch_unwind(AssertUnwindSafe(|| f(input)))
                    .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
                Some(self.complete(Completion {
                    task_id,
                    data,
                    start,
                    outcome,
                }))
            }
            TaskFunctionKind::Async(f) => {
                let f = Arc::clone(f);
                let input = data.clone();
                let completions = completions.clone();
                debug!(%task_id, task_name = %name, "spawning asynchronous task function");
                tokio::spawn(async move {
                    // A panic surfaces as a JoinError instead of unwinding this task.
                    let outcome = match tokio::spawn(async move { f(input).await }).await {
                        Ok(outcome) => outcome,
                        Err(err) if err.is_panic() => Err(panic_message(err.into_panic().as_ref())),
                        Err(err) => Err(err.to_string()),
                    };
                    let _ = completions.send(Completion {
                        task_id,
                        data,
                        start,
                        outcome,
                    });
                });
                None
            }
        }
    }

    /// Turn a finished task into its result or error envelope.
    pub(crate) fn complete(&mut self, completion: Completion) -> MessageValue {
        let Completion {
            task_id,
            data,
            start,
            outcome,
        } = completion;

        match outcome {
            Ok(result) => {
                let task_performance = self.end(start);
                MessageValue {
                    task_id: Some(task_id),
                    data: Some(result),
                    task_performance: Some(task_performance),
                    ..Default::default()
                }
            }
            Err(message) => {
                self.last_completed_at = Instant::now();
                error_message(task_id, start.name, message, data)
            }
        }
    }

    fn end(&mut self, start: TaskStart) -> TaskPerformance {
        let now = Instant::now();
        let statistics = self.statistics.unwrap_or_default();
        let run_time = now.duration_since(start.started_at).as_secs_f64() * 1e3;
        let window = now.duration_since(self.last_completed_at).as_secs_f64() * 1e3;
        self.last_completed_at = now;

        TaskPerformance {
            task_name: start.name,
            start_timestamp: start.start_timestamp,
            run_time: statistics.requires_run_time.then_some(run_time),
            utilization: statistics
                .requires_utilization
                .then(|| utilization(run_time, window)),
        }
    }
}

fn utilization(run_time: f64, window: f64) -> f64 {
    if window <= 0.0 {
        return 0.0;
    }
    (run_time / window).clamp(0.0, 1.0)
}

fn error_message(task_id: TaskId, name: String, message: String, data: Value) -> MessageValue {
    MessageValue {
        task_id: Some(task_id),
        worker_error: Some(WorkerError {
            name,
            message,
            data: Some(data),
        }),
        ..Default::default()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task function panicked".to_string()
    }
}

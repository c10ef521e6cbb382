//! Worker - プロトコル dispatcher
//!
//! # フロー
//! 1. handshake を待つ（workerId + ready:false + port）
//! 2. Ready: 受信 envelope を分類して処理
//!    statistics → checkActive → taskFunctionOperation → task → kill
//! 3. kill: kill handler を実行して結果を返す（Terminated）
//!
//! One task owns the registry, statistics and idle state and multiplexes the
//! inbound channel, async task completions and idle ticks with `select!`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::executor::{Completion, Executor, panic_message};
use super::idle_monitor::IdleMonitor;
use crate::catalog::TaskFunctionCatalog;
use crate::domain::{
    KillHandler, KillMessage, KillStatus, MessageValue, Task, TaskFunctionObject,
    TaskFunctionOperation, TaskFunctionProperties, WorkerError, WorkerId, WorkerOptions,
};
use crate::error::SpindleError;
use crate::ports::{Clock, ResponsePort};
use crate::registry::TaskFunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingHandshake,
    Ready,
    Terminating,
    Terminated,
}

/// Channels a worker is started with.
///
/// `parent` is only used until a handshake delivers a dedicated port, and for
/// reporting a failed handshake.
pub struct WorkerChannel {
    pub inbound: mpsc::UnboundedReceiver<MessageValue>,
    pub parent: ResponsePort,
}

impl WorkerChannel {
    pub fn new(inbound: mpsc::UnboundedReceiver<MessageValue>, parent: ResponsePort) -> Self {
        Self { inbound, parent }
    }
}

/// Outcome of a registry operation. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFunctionOperationResult {
    pub status: bool,
    pub error: Option<SpindleError>,
}

impl TaskFunctionOperationResult {
    fn succeeded(status: bool) -> Self {
        Self {
            status,
            error: None,
        }
    }

    fn failed(error: SpindleError) -> Self {
        Self {
            status: false,
            error: Some(error),
        }
    }
}

impl From<Result<(), SpindleError>> for TaskFunctionOperationResult {
    fn from(result: Result<(), SpindleError>) -> Self {
        match result {
            Ok(()) => Self::succeeded(true),
            Err(err) => Self::failed(err),
        }
    }
}

pub struct Worker {
    id: Option<WorkerId>,
    state: WorkerState,
    options: WorkerOptions,
    registry: TaskFunctionRegistry,
    catalog: Option<TaskFunctionCatalog>,
    executor: Executor,
    idle: IdleMonitor,
    port: Option<ResponsePort>,
}

impl Worker {
    pub(crate) fn new(
        options: WorkerOptions,
        registry: TaskFunctionRegistry,
        catalog: Option<TaskFunctionCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let idle = IdleMonitor::new(options.max_inactive_duration());
        Self {
            id: None,
            state: WorkerState::AwaitingHandshake,
            options,
            registry,
            catalog,
            executor: Executor::new(clock),
            idle,
            port: None,
        }
    }

    /// Id assigned by the handshake.
    pub fn id(&self) -> Option<WorkerId> {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn has_task_function(&self, name: &str) -> TaskFunctionOperationResult {
        match self.registry.has(name) {
            Ok(found) => TaskFunctionOperationResult::succeeded(found),
            Err(err) => TaskFunctionOperationResult::failed(err),
        }
    }

    pub fn add_task_function(
        &mut self,
        name: &str,
        entry: impl Into<TaskFunctionObject>,
    ) -> TaskFunctionOperationResult {
        let result = self.registry.add(name, entry.into());
        self.after_mutation(result)
    }

    pub fn remove_task_function(&mut self, name: &str) -> TaskFunctionOperationResult {
        let result = self.registry.remove(name);
        self.after_mutation(result)
    }

    pub fn set_default_task_function(&mut self, name: &str) -> TaskFunctionOperationResult {
        let result = self.registry.set_default(name);
        self.after_mutation(result)
    }

    pub fn list_task_functions_properties(&self) -> Vec<TaskFunctionProperties> {
        self.registry.list_properties()
    }

    fn after_mutation(&mut self, result: Result<(), SpindleError>) -> TaskFunctionOperationResult {
        if result.is_ok() && self.port.is_some() {
            self.send(MessageValue::task_functions_properties(
                self.registry.list_properties(),
            ));
        }
        result.into()
    }

    /// Serve the coordinator until the inbound channel closes.
    ///
    /// Returns `Err` only for a fatal protocol violation.
    pub async fn run(mut self, channel: WorkerChannel) -> Result<(), SpindleError> {
        let WorkerChannel {
            mut inbound,
            parent,
        } = channel;
        let (completions_tx, mut completions) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                message = inbound.recv() => {
                    let Some(message) = message else { break };
                    self.handle_message(message, &parent, &completions_tx).await?;
                }
                Some(completion) = completions.recv() => {
                    let message = self.executor.complete(completion);
                    self.idle.touch();
                    self.send(message);
                }
                idle = self.idle.tick(), if self.idle.is_armed() => {
                    if idle {
                        debug!(kill_behavior = ?self.options.kill_behavior, "inactive; requesting kill");
                        self.send(MessageValue::kill(KillMessage::Request(
                            self.options.kill_behavior,
                        )));
                    }
                }
            }
        }

        debug!(worker_id = ?self.id, state = ?self.state, "inbound channel closed");
        Ok(())
    }

    async fn handle_message(
        &mut self,
        message: MessageValue,
        parent: &ResponsePort,
        completions: &mpsc::UnboundedSender<Completion>,
    ) -> Result<(), SpindleError> {
        match self.state {
            WorkerState::AwaitingHandshake => {
                self.handshake(message, parent);
                Ok(())
            }
            WorkerState::Ready => {
                self.check_worker_id(&message)?;
                self.dispatch(message, completions).await;
                Ok(())
            }
            WorkerState::Terminating | WorkerState::Terminated => {
                self.check_worker_id(&message)?;
                debug!(state = ?self.state, "dropping message received after kill");
                Ok(())
            }
        }
    }

    /// Every envelope after the handshake must carry this worker's id.
    fn check_worker_id(&self, message: &MessageValue) -> Result<(), SpindleError> {
        let Some(expected) = self.id else {
            return Ok(());
        };
        if message.worker_id != Some(expected) {
            error!(%expected, received = ?message.worker_id, "message routed to the wrong worker");
            return Err(SpindleError::WorkerIdMismatch {
                expected,
                received: message.worker_id,
            });
        }
        Ok(())
    }

    fn handshake(&mut self, message: MessageValue, parent: &ResponsePort) {
        let (Some(worker_id), Some(false)) = (message.worker_id, message.ready) else {
            warn!("ignoring message received before handshake");
            return;
        };
        let properties = self.registry.list_properties();

        match message.port {
            Some(port) if !port.is_closed() => {
                info!(%worker_id, task_functions = properties.len(), "handshake complete");
                self.id = Some(worker_id);
                self.port = Some(port);
                self.state = WorkerState::Ready;
                self.send(MessageValue::ready(true, properties));
            }
            _ => {
                warn!(%worker_id, "handshake without a usable response port");
                let report = MessageValue::ready(false, properties).with_worker_id(worker_id);
                if let Err(err) = parent.send(report) {
                    warn!(error = %err, "failed to report handshake failure");
                }
            }
        }
    }

    async fn dispatch(
        &mut self,
        mut message: MessageValue,
        completions: &mpsc::UnboundedSender<Completion>,
    ) {
        if let Some(statistics) = message.statistics {
            debug!(?statistics, "statistics requirements set");
            self.executor.set_statistics(statistics);
        } else if let Some(enabled) = message.check_active {
            self.set_check_active(enabled);
        } else if let Some(operation) = message.task_function_operation.take() {
            self.task_function_operation(operation, message);
        } else if message.is_task() {
            if let Some(task) = message.into_task() {
                self.run_task(task, completions);
            }
        } else if message.kill == Some(KillMessage::Terminate(true)) {
            self.kill().await;
        } else {
            debug!("ignoring message without a recognised field group");
        }
    }

    fn set_check_active(&mut self, enabled: bool) {
        if !enabled {
            self.idle.disarm();
            debug!("idle monitor disarmed");
        } else if self.idle.arm() {
            debug!(max_inactive_time = self.options.max_inactive_time, "idle monitor armed");
        }
    }

    fn task_function_operation(&mut self, operation: TaskFunctionOperation, message: MessageValue) {
        let properties = message
            .task_function_properties
            .unwrap_or_else(|| TaskFunctionProperties::named(""));

        let result = match &operation {
            TaskFunctionOperation::Add => {
                self.add_from_catalog(&properties, message.task_function_source.as_deref())
            }
            TaskFunctionOperation::Remove => self.remove_task_function(&properties.name),
            TaskFunctionOperation::Default => self.set_default_task_function(&properties.name),
            TaskFunctionOperation::Unknown(name) => {
                TaskFunctionOperationResult::failed(SpindleError::UnknownOperation(name.clone()))
            }
        };
        if let Some(err) = &result.error {
            warn!(%operation, name = %properties.name, error = %err, "task function operation failed");
        }

        let worker_error = result.error.map(|err| WorkerError {
            name: properties.name.clone(),
            message: err.to_string(),
            data: None,
        });
        self.send(MessageValue {
            task_function_operation: Some(operation),
            task_function_operation_status: Some(result.status),
            task_function_properties: Some(properties),
            worker_error,
            ..Default::default()
        });
    }

    fn add_from_catalog(
        &mut self,
        properties: &TaskFunctionProperties,
        source: Option<&str>,
    ) -> TaskFunctionOperationResult {
        let Some(catalog) = &self.catalog else {
            return TaskFunctionOperationResult::failed(SpindleError::DynamicRegistrationDisabled);
        };
        let Some(source) = source else {
            return TaskFunctionOperationResult::failed(SpindleError::InvalidArgument(
                "taskFunctionSource is required to add a task function".to_string(),
            ));
        };
        let task_function = match catalog.resolve(source) {
            Ok(task_function) => task_function,
            Err(err) => return TaskFunctionOperationResult::failed(err),
        };
        let entry = TaskFunctionObject {
            task_function,
            priority: properties.priority,
            strategy: properties.strategy,
        };
        self.add_task_function(&properties.name, entry)
    }

    fn run_task(&mut self, task: Task, completions: &mpsc::UnboundedSender<Completion>) {
        debug!(task_id = %task.task_id, task_name = task.function_name(), "task received");
        let task_function = self
            .registry
            .get(task.function_name())
            .map(|entry| entry.task_function.clone());

        if let Some(message) = self.executor.execute(task, task_function, completions) {
            self.idle.touch();
            self.send(message);
        }
    }

    async fn kill(&mut self) {
        self.state = WorkerState::Terminating;
        self.idle.disarm();
        info!(worker_id = ?self.id, "kill received");

        let status = match self.options.kill_handler.clone() {
            None => KillStatus::Success,
            Some(KillHandler::Sync(handler)) => match catch_unwind(AssertUnwindSafe(|| handler())) {
                Ok(Ok(())) => KillStatus::Success,
                Ok(Err(err)) => {
                    warn!(error = %err, "kill handler failed");
                    KillStatus::Failure
                }
                Err(payload) => {
                    warn!(panic = %panic_message(payload.as_ref()), "kill handler panicked");
                    KillStatus::Failure
                }
            },
            Some(KillHandler::Async(handler)) => {
                match tokio::spawn(async move { handler().await }).await {
                    Ok(Ok(())) => KillStatus::Success,
                    Ok(Err(err)) => {
                        warn!(error = %err, "kill handler failed");
                        KillStatus::Failure
                    }
                    Err(err) => {
                        warn!(error = %err, "kill handler panicked");
                        KillStatus::Failure
                    }
                }
            }
        };

        self.send(MessageValue::kill(KillMessage::Outcome(status)));
        self.state = WorkerState::Terminated;
        info!(worker_id = ?self.id, ?status, "worker terminated");
    }

    /// Stamp and send on the dedicated port. Failures are logged, never fatal.
    fn send(&self, message: MessageValue) {
        let Some(port) = &self.port else {
            warn!("no response port; dropping outbound message");
            return;
        };
        let message = match self.id {
            Some(id) => message.with_worker_id(id),
            None => message,
        };
        if let Err(err) = port.send(message) {
            warn!(error = %err, "failed to send message to coordinator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::WorkerBuilder;
    use crate::domain::{KillBehavior, TaskFunction, WorkerStatistics};
    use crate::impls::LocalWorker;
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::time::Instant;

    fn double(data: Value) -> Result<Value, String> {
        let n = data.as_i64().ok_or("expected an integer")?;
        Ok(Value::from(n * 2))
    }

    fn triple(data: Value) -> Result<Value, String> {
        let n = data.as_i64().ok_or("expected an integer")?;
        Ok(Value::from(n * 3))
    }

    fn statistics() -> WorkerStatistics {
        WorkerStatistics {
            requires_run_time: true,
            requires_utilization: false,
        }
    }

    async fn ready_worker(builder: WorkerBuilder) -> LocalWorker {
        let (mut worker, _) = LocalWorker::start(builder.build().unwrap()).await.unwrap();
        worker.configure_statistics(statistics()).unwrap();
        worker
    }

    fn names(properties: &[TaskFunctionProperties]) -> Vec<&str> {
        properties.iter().map(|p| p.name.as_str()).collect()
    }

    #[tokio::test]
    async fn default_task_doubles_its_input() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        let task_id = worker.submit(None, json!(5)).unwrap();
        let reply = worker.recv().await.unwrap();

        assert_eq!(reply.task_id, Some(task_id));
        assert_eq!(reply.worker_id, Some(worker.id()));
        assert_eq!(reply.data, Some(json!(10)));
        let perf = reply.task_performance.unwrap();
        assert_eq!(perf.task_name, "default");
        assert!(perf.run_time.is_some());
        assert!(perf.utilization.is_none());
    }

    #[tokio::test]
    async fn async_failure_is_reported_and_worker_keeps_going() {
        let boom = TaskFunction::asynchronous(|_: Value| async { Err::<Value, _>("boom") });
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .task_function("boom", boom)
                .task_function("double", TaskFunction::sync(double)),
        )
        .await;

        let failed = worker.submit(Some("boom"), json!(1)).unwrap();
        let reply = worker.recv().await.unwrap();
        assert_eq!(reply.task_id, Some(failed));
        let err = reply.worker_error.unwrap();
        assert_eq!((err.name.as_str(), err.message.as_str()), ("boom", "boom"));
        assert_eq!(err.data, Some(json!(1)));

        worker.submit(Some("double"), json!(2)).unwrap();
        assert_eq!(worker.recv().await.unwrap().data, Some(json!(4)));
    }

    #[tokio::test]
    async fn unknown_task_name_yields_one_error_and_worker_continues() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        worker.submit(Some("missing"), json!({ "x": 1 })).unwrap();
        let err = worker.recv().await.unwrap().worker_error.unwrap();
        assert_eq!(err.message, "Task function 'missing' not found");
        assert_eq!(err.data, Some(json!({ "x": 1 })));

        worker.submit(Some("double"), json!(21)).unwrap();
        assert_eq!(worker.recv().await.unwrap().data, Some(json!(42)));
    }

    #[tokio::test]
    async fn tasks_before_statistics_are_reported() {
        let (mut worker, _) = LocalWorker::start(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        worker.submit(None, json!(1)).unwrap();
        let err = worker.recv().await.unwrap().worker_error.unwrap();
        assert_eq!(err.message, SpindleError::StatisticsNotConfigured.to_string());
    }

    #[tokio::test]
    async fn mismatched_worker_id_is_fatal() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        let stranger = WorkerId::generate();
        let task = MessageValue::task(Task::new(crate::domain::TaskId::generate(), None, json!(5)))
            .with_worker_id(stranger);
        worker.send_raw(task).unwrap();

        // the dispatcher exits without answering, closing the response port
        assert!(worker.recv().await.is_none());
        assert_eq!(
            worker.close().await,
            Err(SpindleError::WorkerIdMismatch {
                expected: worker.id(),
                received: Some(stranger),
            })
        );
    }

    #[tokio::test]
    async fn missing_worker_id_is_fatal() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;
        worker.send_raw(MessageValue::check_active(true)).unwrap();
        assert!(worker.recv().await.is_none());
        assert!(matches!(
            worker.close().await,
            Err(SpindleError::WorkerIdMismatch { received: None, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_requests_its_kill_once_within_the_window() {
        let options = WorkerOptions::default()
            .with_max_inactive_time(100)
            .with_kill_behavior(KillBehavior::Hard);
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .options(options),
        )
        .await;

        let armed_at = Instant::now();
        worker.set_check_active(true).unwrap();
        let request = worker.recv().await.unwrap();
        let elapsed = armed_at.elapsed();

        assert_eq!(request.kill, Some(KillMessage::Request(KillBehavior::Hard)));
        assert!(elapsed > Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(150), "{elapsed:?}");
        assert!(worker.try_recv().is_none());

        // still serving tasks
        worker.submit(None, json!(3)).unwrap();
        assert_eq!(worker.recv().await.unwrap().data, Some(json!(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_check_active_stops_kill_requests() {
        let options = WorkerOptions::default().with_max_inactive_time(100);
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .options(options),
        )
        .await;

        worker.set_check_active(true).unwrap();
        worker.set_check_active(false).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        worker.submit(None, json!(1)).unwrap();

        let reply = worker.recv().await.unwrap();
        assert!(reply.kill.is_none());
        assert_eq!(reply.data, Some(json!(2)));
    }

    fn failing_kill() -> KillHandler {
        KillHandler::sync(|| Err::<(), _>("disk busy"))
    }

    fn panicking_kill() -> KillHandler {
        KillHandler::asynchronous(|| async {
            if true {
                panic!("cleanup exploded");
            }
            Ok::<(), String>(())
        })
    }

    #[rstest]
    #[case::no_handler(None, KillStatus::Success)]
    #[case::sync_ok(Some(KillHandler::sync(|| Ok::<(), String>(()))), KillStatus::Success)]
    #[case::async_ok(
        Some(KillHandler::asynchronous(|| async { Ok::<(), String>(()) })),
        KillStatus::Success
    )]
    #[case::sync_err(Some(failing_kill()), KillStatus::Failure)]
    #[case::sync_panic(
        Some(KillHandler::sync(|| -> Result<(), String> { panic!("cleanup exploded") })),
        KillStatus::Failure
    )]
    #[case::async_panic(Some(panicking_kill()), KillStatus::Failure)]
    #[tokio::test]
    async fn kill_reports_handler_outcome(
        #[case] handler: Option<KillHandler>,
        #[case] expected: KillStatus,
    ) {
        let mut options = WorkerOptions::default();
        options.kill_handler = handler;
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .options(options),
        )
        .await;

        worker.kill().unwrap();
        let outcome = worker.recv().await.unwrap();
        assert_eq!(outcome.kill, Some(KillMessage::Outcome(expected)));

        // ignored after termination
        worker.submit(None, json!(1)).unwrap();
        assert_eq!(worker.close().await, Ok(()));
        assert!(worker.recv().await.is_none());
    }

    #[tokio::test]
    async fn mismatched_worker_id_after_kill_is_still_fatal() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        worker.kill().unwrap();
        let outcome = worker.recv().await.unwrap();
        assert_eq!(outcome.kill, Some(KillMessage::Outcome(KillStatus::Success)));

        let stranger = WorkerId::generate();
        worker
            .send_raw(MessageValue::check_active(true).with_worker_id(stranger))
            .unwrap();
        assert_eq!(
            worker.close().await,
            Err(SpindleError::WorkerIdMismatch {
                expected: worker.id(),
                received: Some(stranger),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn kill_disarms_the_idle_monitor() {
        let options = WorkerOptions::default().with_max_inactive_time(100);
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .options(options),
        )
        .await;

        worker.set_check_active(true).unwrap();
        worker.kill().unwrap();
        let outcome = worker.recv().await.unwrap();
        assert_eq!(outcome.kill, Some(KillMessage::Outcome(KillStatus::Success)));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(worker.try_recv().is_none());
        assert_eq!(worker.close().await, Ok(()));
    }

    #[tokio::test]
    async fn start_timestamp_comes_from_the_configured_clock() {
        use crate::ports::FixedClock;
        use chrono::{TimeZone, Utc};

        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .clock(Arc::new(FixedClock::new(at))),
        )
        .await;

        worker.submit(None, json!(1)).unwrap();
        let perf = worker.recv().await.unwrap().task_performance.unwrap();
        assert_eq!(perf.start_timestamp, 1_704_067_200_000.0);
    }

    #[tokio::test]
    async fn add_without_catalog_is_refused() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        worker
            .task_function_operation(
                TaskFunctionOperation::Add,
                TaskFunctionProperties::named("triple"),
                Some("triple".to_string()),
            )
            .unwrap();
        let reply = worker.recv().await.unwrap();

        assert_eq!(reply.task_function_operation, Some(TaskFunctionOperation::Add));
        assert_eq!(reply.task_function_operation_status, Some(false));
        let err = reply.worker_error.unwrap();
        assert_eq!(err.name, "triple");
        assert_eq!(err.message, SpindleError::DynamicRegistrationDisabled.to_string());
    }

    #[tokio::test]
    async fn add_from_catalog_then_run_it() {
        let catalog = TaskFunctionCatalog::new().with("triple", TaskFunction::sync(triple));
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .catalog(catalog),
        )
        .await;

        let mut properties = TaskFunctionProperties::named("times3");
        properties.priority = Some(2);
        worker
            .task_function_operation(
                TaskFunctionOperation::Add,
                properties.clone(),
                Some(" triple ".to_string()),
            )
            .unwrap();

        let snapshot = worker.recv().await.unwrap();
        let listed = snapshot.task_functions_properties.unwrap();
        assert_eq!(names(&listed), vec!["default", "double", "times3"]);
        assert_eq!(listed[2].priority, Some(2));

        let echo = worker.recv().await.unwrap();
        assert_eq!(echo.task_function_operation_status, Some(true));
        assert_eq!(echo.task_function_properties, Some(properties));
        assert!(echo.worker_error.is_none());

        worker.submit(Some("times3"), json!(3)).unwrap();
        assert_eq!(worker.recv().await.unwrap().data, Some(json!(9)));
    }

    #[tokio::test]
    async fn add_with_unknown_source_is_refused() {
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .function(TaskFunction::sync(double))
                .catalog(TaskFunctionCatalog::new()),
        )
        .await;

        worker
            .task_function_operation(
                TaskFunctionOperation::Add,
                TaskFunctionProperties::named("x"),
                Some("x => x".to_string()),
            )
            .unwrap();
        let reply = worker.recv().await.unwrap();
        assert_eq!(reply.task_function_operation_status, Some(false));
        assert_eq!(
            reply.worker_error.unwrap().message,
            SpindleError::UnknownTaskFunctionSource("x => x".to_string()).to_string()
        );
    }

    #[tokio::test]
    async fn set_default_then_remove_previous_default() {
        let mut worker = ready_worker(
            WorkerBuilder::new()
                .task_function("double", TaskFunction::sync(double))
                .task_function("triple", TaskFunction::sync(triple)),
        )
        .await;

        // the aliased default is protected
        worker
            .task_function_operation(
                TaskFunctionOperation::Remove,
                TaskFunctionProperties::named("double"),
                None,
            )
            .unwrap();
        let refused = worker.recv().await.unwrap();
        assert_eq!(refused.task_function_operation_status, Some(false));

        worker
            .task_function_operation(
                TaskFunctionOperation::Default,
                TaskFunctionProperties::named("triple"),
                None,
            )
            .unwrap();
        let snapshot = worker.recv().await.unwrap().task_functions_properties.unwrap();
        assert_eq!(names(&snapshot), vec!["default", "triple", "double"]);
        assert_eq!(worker.recv().await.unwrap().task_function_operation_status, Some(true));

        worker
            .task_function_operation(
                TaskFunctionOperation::Remove,
                TaskFunctionProperties::named("double"),
                None,
            )
            .unwrap();
        let snapshot = worker.recv().await.unwrap().task_functions_properties.unwrap();
        assert_eq!(names(&snapshot), vec!["default", "triple"]);
        assert_eq!(worker.recv().await.unwrap().task_function_operation_status, Some(true));

        worker.submit(None, json!(2)).unwrap();
        assert_eq!(worker.recv().await.unwrap().data, Some(json!(6)));
    }

    #[tokio::test]
    async fn unknown_operation_is_reported() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        worker
            .send(MessageValue::task_function_operation(
                TaskFunctionOperation::from("rename".to_string()),
                TaskFunctionProperties::named("double"),
                None,
            ))
            .unwrap();
        let reply = worker.recv().await.unwrap();
        assert_eq!(reply.task_function_operation_status, Some(false));
        assert_eq!(
            reply.worker_error.unwrap().message,
            SpindleError::UnknownOperation("rename".to_string()).to_string()
        );
    }

    #[tokio::test]
    async fn statistics_win_over_other_field_groups() {
        let mut worker = ready_worker(WorkerBuilder::new().function(TaskFunction::sync(double))).await;

        // statistics and a task in one envelope: only statistics is handled
        let mut message = MessageValue::task(Task::new(
            crate::domain::TaskId::generate(),
            None,
            json!(1),
        ));
        message.statistics = Some(WorkerStatistics::default());
        worker.send(message).unwrap();

        let task_id = worker.submit(None, json!(4)).unwrap();
        let reply = worker.recv().await.unwrap();
        assert_eq!(reply.task_id, Some(task_id));
        assert!(reply.task_performance.unwrap().run_time.is_none());
    }

    #[tokio::test]
    async fn handshake_without_port_reports_not_ready_on_parent() {
        let worker = WorkerBuilder::new()
            .function(TaskFunction::sync(double))
            .build()
            .unwrap();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (parent, mut parent_rx) = ResponsePort::channel();
        let join = tokio::spawn(worker.run(WorkerChannel::new(inbound_rx, parent)));

        // anything before the handshake is dropped
        inbound_tx.send(MessageValue::check_active(true)).unwrap();

        let worker_id = WorkerId::generate();
        inbound_tx.send(MessageValue::handshake(worker_id, None)).unwrap();
        let report = parent_rx.recv().await.unwrap();
        assert_eq!(report.ready, Some(false));
        assert_eq!(report.worker_id, Some(worker_id));
        assert_eq!(
            names(&report.task_functions_properties.unwrap()),
            vec!["default", "double"]
        );

        // still waiting: a closed port is refused too
        let (port, port_rx) = ResponsePort::channel();
        drop(port_rx);
        inbound_tx.send(MessageValue::handshake(worker_id, Some(port))).unwrap();
        assert_eq!(parent_rx.recv().await.unwrap().ready, Some(false));

        // a usable port completes it
        let (port, mut port_rx) = ResponsePort::channel();
        inbound_tx.send(MessageValue::handshake(worker_id, Some(port))).unwrap();
        let ready = port_rx.recv().await.unwrap();
        assert_eq!(ready.ready, Some(true));
        assert_eq!(ready.worker_id, Some(worker_id));

        drop(inbound_tx);
        assert_eq!(join.await.unwrap(), Ok(()));
        assert!(parent_rx.try_recv().is_err());
    }

    #[test]
    fn registry_methods_work_before_handshake() {
        let mut worker = WorkerBuilder::new()
            .function(TaskFunction::sync(double))
            .build()
            .unwrap();
        assert_eq!(worker.state(), WorkerState::AwaitingHandshake);
        assert!(worker.id().is_none());

        assert!(worker.add_task_function("triple", TaskFunction::sync(triple)).status);
        assert!(worker.has_task_function("triple").status);

        let reserved = worker.add_task_function("default", TaskFunction::sync(triple));
        assert!(!reserved.status);
        assert_eq!(
            reserved.error,
            Some(SpindleError::ReservedName("default".to_string()))
        );

        let blank = worker.has_task_function(" ");
        assert!(!blank.status);
        assert!(matches!(blank.error, Some(SpindleError::InvalidArgument(_))));

        assert!(worker.set_default_task_function("triple").status);
        assert!(worker.remove_task_function("double").status);
        assert_eq!(
            names(&worker.list_task_functions_properties()),
            vec!["default", "triple"]
        );
    }
}

//! LocalWorker - 同一プロセス内の coordinator 側ハンドル
//!
//! # 学習ポイント
//! - JoinHandle で dispatcher の終了結果を受け取る
//! - handshake で専用の response port を渡す
//!
//! Spawns a [`Worker`] on the current tokio runtime and performs the handshake.
//! Every message sent through [`LocalWorker::send`] is stamped with the
//! worker id; [`LocalWorker::send_raw`] sends it untouched.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::{Worker, WorkerChannel};
use crate::domain::{
    MessageValue, Task, TaskFunctionOperation, TaskFunctionProperties, TaskId, WorkerId,
    WorkerStatistics,
};
use crate::error::SpindleError;
use crate::ports::ResponsePort;

pub struct LocalWorker {
    worker_id: WorkerId,
    inbound: Option<mpsc::UnboundedSender<MessageValue>>,
    responses: mpsc::UnboundedReceiver<MessageValue>,
    /// Failed-handshake reports land here; kept open for the worker's lifetime.
    _parent: mpsc::UnboundedReceiver<MessageValue>,
    join: Option<JoinHandle<Result<(), SpindleError>>>,
}

impl LocalWorker {
    /// Spawn `worker` and complete the handshake.
    ///
    /// Returns the handle and the task functions the worker reported as ready.
    pub async fn start(
        worker: Worker,
    ) -> Result<(Self, Vec<TaskFunctionProperties>), SpindleError> {
        let (port, responses) = ResponsePort::channel();
        Self::start_with_port(worker, port, responses).await
    }

    async fn start_with_port(
        worker: Worker,
        port: ResponsePort,
        mut responses: mpsc::UnboundedReceiver<MessageValue>,
    ) -> Result<(Self, Vec<TaskFunctionProperties>), SpindleError> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (parent, mut parent_rx) = ResponsePort::channel();

        let join = tokio::spawn(worker.run(WorkerChannel::new(inbound_rx, parent)));
        let worker_id = WorkerId::generate();
        inbound_tx
            .send(MessageValue::handshake(worker_id, Some(port)))
            .map_err(|_| SpindleError::ChannelClosed)?;

        let ready = tokio::select! {
            Some(ready) = responses.recv() => ready,
            Some(report) = parent_rx.recv() => {
                warn!(
                    %worker_id,
                    task_functions = ?report.task_functions_properties,
                    "worker refused the handshake"
                );
                return Err(SpindleError::HandshakeRefused(worker_id));
            }
            else => return Err(SpindleError::ChannelClosed),
        };
        if ready.ready != Some(true) {
            warn!(%worker_id, ready = ?ready.ready, "unexpected handshake reply");
            return Err(SpindleError::HandshakeRefused(worker_id));
        }
        debug!(%worker_id, "local worker ready");

        let local = Self {
            worker_id,
            inbound: Some(inbound_tx),
            responses,
            _parent: parent_rx,
            join: Some(join),
        };
        Ok((local, ready.task_functions_properties.unwrap_or_default()))
    }

    pub fn id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn send(&self, message: MessageValue) -> Result<(), SpindleError> {
        self.send_raw(message.with_worker_id(self.worker_id))
    }

    /// Send without stamping the worker id.
    pub fn send_raw(&self, message: MessageValue) -> Result<(), SpindleError> {
        let inbound = self.inbound.as_ref().ok_or(SpindleError::ChannelClosed)?;
        inbound.send(message).map_err(|_| SpindleError::ChannelClosed)
    }

    pub fn configure_statistics(&self, statistics: WorkerStatistics) -> Result<(), SpindleError> {
        self.send(MessageValue::statistics(statistics))
    }

    pub fn set_check_active(&self, enabled: bool) -> Result<(), SpindleError> {
        self.send(MessageValue::check_active(enabled))
    }

    /// Submit a task; `None` runs the default task function.
    pub fn submit(&self, name: Option<&str>, data: Value) -> Result<TaskId, SpindleError> {
        let task_id = TaskId::generate();
        self.send(MessageValue::task(Task::new(task_id, name, data)))?;
        Ok(task_id)
    }

    pub fn task_function_operation(
        &self,
        operation: TaskFunctionOperation,
        properties: TaskFunctionProperties,
        source: Option<String>,
    ) -> Result<(), SpindleError> {
        self.send(MessageValue::task_function_operation(
            operation, properties, source,
        ))
    }

    /// Ask the worker to run its kill handler and terminate.
    pub fn kill(&self) -> Result<(), SpindleError> {
        self.send(MessageValue::terminate())
    }

    /// Next message from the worker; `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<MessageValue> {
        self.responses.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MessageValue> {
        self.responses.try_recv().ok()
    }

    /// Close the inbound channel and wait for the dispatcher to stop.
    ///
    /// Messages the worker sent before stopping can still be drained with
    /// [`LocalWorker::recv`].
    pub async fn close(&mut self) -> Result<(), SpindleError> {
        self.inbound.take();
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        match join.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(SpindleError::ChannelClosed),
        }
    }
}

use thiserror::Error;

use crate::domain::WorkerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpindleError {
    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("no task functions registered")]
    EmptyRegistry,

    #[error("task function name '{0}' is reserved")]
    ReservedName(String),

    #[error("cannot remove task function '{name}': {reason}")]
    ProtectedEntry { name: String, reason: &'static str },

    #[error("Task function '{0}' not found")]
    TaskFunctionNotFound(String),

    #[error("performance statistics computation requirements not set")]
    StatisticsNotConfigured,

    #[error("unknown task function operation '{0}'")]
    UnknownOperation(String),

    #[error("dynamic task function registration is not enabled on this worker")]
    DynamicRegistrationDisabled,

    #[error("task function source '{0}' is not in the catalog")]
    UnknownTaskFunctionSource(String),

    /// Fatal: the message was routed to the wrong worker.
    #[error("message worker id {} does not match worker id {expected}", received_id(.received))]
    WorkerIdMismatch {
        expected: WorkerId,
        received: Option<WorkerId>,
    },

    #[error("worker {0} refused the handshake")]
    HandshakeRefused(WorkerId),

    #[error("response channel closed")]
    ChannelClosed,
}

fn received_id(received: &Option<WorkerId>) -> String {
    match received {
        Some(id) => id.to_string(),
        None => "<none>".to_string(),
    }
}

impl SpindleError {
    /// Only identity violations stop the dispatcher.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpindleError::WorkerIdMismatch { .. })
    }
}

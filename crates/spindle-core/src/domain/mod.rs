//! Domain model: ids, task functions, options, statistics and the wire envelope.

pub mod ids;
pub mod message;
pub mod options;
pub mod performance;
pub mod task;
pub mod task_function;

pub use ids::{TaskId, WorkerId};
pub use message::{KillMessage, KillStatus, MessageValue, TaskFunctionOperation, WorkerError};
pub use options::{KillBehavior, KillHandler, WorkerOptions};
pub use performance::{TaskPerformance, WorkerStatistics};
pub use task::Task;
pub use task_function::{
    DEFAULT_TASK_NAME, TaskFunction, TaskFunctionObject, TaskFunctionProperties, TaskResult,
    WorkerChoiceStrategy,
};

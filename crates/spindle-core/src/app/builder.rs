//! WorkerBuilder - worker の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 不正な構成では worker は起動しない

use std::sync::Arc;

use crate::catalog::TaskFunctionCatalog;
use crate::domain::{TaskFunction, TaskFunctionObject, WorkerOptions};
use crate::error::SpindleError;
use crate::ports::{Clock, SystemClock};
use crate::registry::TaskFunctionRegistry;
use crate::typed::{Handler, TypedHandler, TypedTask};
use crate::validation::check_worker_options;

use super::worker_loop::Worker;

/// Builds a [`Worker`] from either one task function or a named record.
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new()
///     .task_function("resize", TaskFunction::sync(resize))
///     .typed::<Transcode, _>(TranscodeHandler)
///     .options(WorkerOptions::default().with_max_inactive_time(30_000))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - 何も登録されていなければ `MissingArgument`
/// - 単体の関数と名前付き record の混在は `InvalidArgument`
/// - options と各 entry は build() 時に検証
pub struct WorkerBuilder {
    single: Option<TaskFunction>,
    named: Vec<(String, TaskFunctionObject)>,
    options: WorkerOptions,
    catalog: Option<TaskFunctionCatalog>,
    clock: Arc<dyn Clock>,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            single: None,
            named: Vec::new(),
            options: WorkerOptions::default(),
            catalog: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Register one function as both `"default"` and its derived name.
    pub fn function(mut self, task_function: TaskFunction) -> Self {
        self.single = Some(task_function);
        self
    }

    /// Add a named entry. The first one becomes the default.
    pub fn task_function(
        mut self,
        name: impl Into<String>,
        entry: impl Into<TaskFunctionObject>,
    ) -> Self {
        self.named.push((name.into(), entry.into()));
        self
    }

    /// Add a typed handler under `T::NAME`.
    pub fn typed<T: TypedTask, H: Handler<T> + 'static>(self, handler: H) -> Self {
        let task_function = TypedHandler::<T, H>::new(handler).into_task_function();
        self.task_function(T::NAME, task_function)
    }

    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Allow the coordinator to register functions from `catalog` at runtime.
    pub fn catalog(mut self, catalog: TaskFunctionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Worker, SpindleError> {
        check_worker_options(&self.options)?;

        let registry = match (self.single, self.named.is_empty()) {
            (None, true) => {
                return Err(SpindleError::MissingArgument(
                    "a task function or a record of task functions is required".to_string(),
                ));
            }
            (Some(_), false) => {
                return Err(SpindleError::InvalidArgument(
                    "register either a single task function or a named record, not both"
                        .to_string(),
                ));
            }
            (Some(task_function), true) => TaskFunctionRegistry::from_single(task_function)?,
            (None, false) => TaskFunctionRegistry::from_named(self.named)?,
        };

        Ok(Worker::new(self.options, registry, self.catalog, self.clock))
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

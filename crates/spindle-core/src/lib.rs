//! spindle-core
//!
//! Worker side of a task-execution protocol: a coordinator hands tasks to
//! workers over message channels, and each worker runs named task functions
//! and reports results, idleness and its own termination.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_function, options, performance, message）
//! - **validation**: options / registry entry の検証
//! - **registry**: name → task function（default alias 付き）
//! - **catalog**: coordinator が実行時に登録できる task function の一覧
//! - **ports**: 抽象化レイヤー（Clock, ResponsePort）
//! - **app**: WorkerBuilder, Worker（dispatcher）, executor, idle monitor
//! - **typed**: 型付き task function API（TypedTask, Handler）
//! - **impls**: LocalWorker（同一プロセス内の coordinator 側ハンドル）

pub mod app;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod registry;
pub mod typed;
pub mod validation;

pub use app::{TaskFunctionOperationResult, Worker, WorkerBuilder, WorkerChannel, WorkerState};
pub use catalog::TaskFunctionCatalog;
pub use error::SpindleError;
pub use impls::LocalWorker;

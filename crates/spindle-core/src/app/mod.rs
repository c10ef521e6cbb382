//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **WorkerBuilder**: worker の構築と起動時検証
//! - **Worker**: handshake / dispatch / kill のプロトコル処理
//! - **Executor**: task function の実行と結果 envelope
//! - **IdleMonitor**: 非アクティブ検知

pub mod builder;
mod executor;
mod idle_monitor;
pub mod worker_loop;

pub use self::builder::WorkerBuilder;
pub use self::worker_loop::{TaskFunctionOperationResult, Worker, WorkerChannel, WorkerState};

//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **LocalWorker**: 同一プロセス内で worker を起動する coordinator 側ハンドル

pub mod inproc;

pub use self::inproc::LocalWorker;

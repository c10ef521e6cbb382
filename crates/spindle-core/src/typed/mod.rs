//! Typed - 型付き task function API
//!
//! 名前の typo と data の形を型で縛る表層。
//!
//! # 二層構造
//! - **表層（Typed）**: `TypedTask` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `TaskFunction` - JSON in / JSON out, type erasure

pub mod handler;
pub mod task;

pub use self::handler::{Handler, TypedHandler};
pub use self::task::TypedTask;

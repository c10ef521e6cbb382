//! Handler trait - TypedTask を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Type erasure パターン (TypedHandler<T, H> → TaskFunction)

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::task::TypedTask;
use crate::domain::{TaskFunction, TaskResult};

/// Runs one typed task.
///
/// # 使用例
/// ```ignore
/// struct ResizeHandler;
///
/// #[async_trait]
/// impl Handler<Resize> for ResizeHandler {
///     async fn handle(&self, task: Resize) -> Result<Vec<u8>, String> {
///         Ok(render(task.width, task.height))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TypedTask>: Send + Sync {
    async fn handle(&self, task: T) -> Result<T::Output, String>;
}

/// Adapts a `Handler<T>` to the JSON-in/JSON-out shape the executor runs.
pub struct TypedHandler<T: TypedTask, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: TypedTask, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }

    async fn handle_value(&self, data: Value) -> TaskResult {
        let task: T = serde_json::from_value(data).map_err(|e| format!("json decode: {e}"))?;
        let output = self.handler.handle(task).await?;
        serde_json::to_value(output).map_err(|e| format!("json encode: {e}"))
    }
}

impl<T: TypedTask, H: Handler<T> + 'static> TypedHandler<T, H> {
    /// Erase into an asynchronous task function.
    pub fn into_task_function(self) -> TaskFunction {
        let this = Arc::new(self);
        TaskFunction::asynchronous(move |data| {
            let this = Arc::clone(&this);
            async move { this.handle_value(data).await }
        })
    }
}

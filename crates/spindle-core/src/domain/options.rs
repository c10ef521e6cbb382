//! Worker options: idle-kill behavior, inactivity window and kill handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task_function::BoxFuture;
use crate::error::SpindleError;
use crate::validation;

pub const DEFAULT_MAX_INACTIVE_TIME_MS: u64 = 60_000;

/// Smallest accepted inactivity window.
pub const MIN_MAX_INACTIVE_TIME_MS: u64 = 5;

/// Severity a worker attaches to its own idle kill-request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KillBehavior {
    /// The pool may let the worker finish what it is doing.
    #[default]
    Soft,
    /// The pool should terminate the worker right away.
    Hard,
}

type SyncKillFn = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;
type AsyncKillFn = Arc<dyn Fn() -> BoxFuture<Result<(), String>> + Send + Sync>;

/// Cleanup hook run when the coordinator sends the terminal kill.
#[derive(Clone)]
pub enum KillHandler {
    Sync(SyncKillFn),
    Async(AsyncKillFn),
}

impl KillHandler {
    pub fn sync<F, E>(f: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        KillHandler::Sync(Arc::new(move || f().map_err(|e| e.to_string())))
    }

    pub fn asynchronous<F, Fut, E>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        KillHandler::Async(Arc::new(move || {
            let fut = f();
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        }))
    }
}

impl fmt::Debug for KillHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillHandler::Sync(_) => f.write_str("KillHandler::Sync"),
            KillHandler::Async(_) => f.write_str("KillHandler::Async"),
        }
    }
}

/// Options fixed at worker construction.
///
/// Unset fields take their defaults (`SOFT`, 60s). Use
/// [`WorkerOptions::from_json`] to load them from a configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerOptions {
    pub kill_behavior: KillBehavior,

    /// Inactivity window in milliseconds before an idle kill-request is sent.
    pub max_inactive_time: u64,

    #[serde(skip)]
    pub kill_handler: Option<KillHandler>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            kill_behavior: KillBehavior::Soft,
            max_inactive_time: DEFAULT_MAX_INACTIVE_TIME_MS,
            kill_handler: None,
        }
    }
}

impl WorkerOptions {
    /// Validate a raw configuration record, then apply defaults.
    pub fn from_json(record: &Value) -> Result<Self, SpindleError> {
        validation::check_valid_worker_options(record)?;
        serde_json::from_value(record.clone())
            .map_err(|e| SpindleError::InvalidArgument(format!("worker options: {e}")))
    }

    pub fn with_kill_behavior(mut self, kill_behavior: KillBehavior) -> Self {
        self.kill_behavior = kill_behavior;
        self
    }

    pub fn with_max_inactive_time(mut self, max_inactive_time_ms: u64) -> Self {
        self.max_inactive_time = max_inactive_time_ms;
        self
    }

    pub fn with_kill_handler(mut self, kill_handler: KillHandler) -> Self {
        self.kill_handler = Some(kill_handler);
        self
    }

    pub fn max_inactive_duration(&self) -> Duration {
        Duration::from_millis(self.max_inactive_time)
    }
}

//! TaskFunctionCatalog - task functions the coordinator may register at runtime.
//!
//! A registry "add" operation names a catalog key instead of shipping code.
//! Workers built without a catalog refuse every "add" operation, so enabling
//! runtime registration is an explicit choice of whoever builds the worker.

use std::collections::HashMap;

use crate::domain::TaskFunction;
use crate::error::SpindleError;

#[derive(Debug, Clone, Default)]
pub struct TaskFunctionCatalog {
    functions: HashMap<String, TaskFunction>,
}

impl TaskFunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `task_function` available under `key`. A repeated key replaces the entry.
    pub fn with(mut self, key: impl Into<String>, task_function: TaskFunction) -> Self {
        self.functions.insert(key.into(), task_function);
        self
    }

    /// Look up the function named by a registry "add" operation's source text.
    pub fn resolve(&self, source: &str) -> Result<TaskFunction, SpindleError> {
        let key = source.trim();
        self.functions
            .get(key)
            .cloned()
            .ok_or_else(|| SpindleError::UnknownTaskFunctionSource(key.to_string()))
    }

    /// Catalog keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.functions.keys().cloned().collect();
        keys.sort();
        keys
    }
}

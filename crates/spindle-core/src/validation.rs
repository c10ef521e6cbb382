//! Validators for worker options and task function entries.
//!
//! All checks are pure: they never mutate their input, and callers apply
//! defaults only after a check has passed.

use serde_json::Value;

use crate::domain::options::MIN_MAX_INACTIVE_TIME_MS;
use crate::domain::{KillBehavior, TaskFunctionObject, WorkerOptions};
use crate::error::SpindleError;

/// Largest integer exactly representable in an IEEE-754 double (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

pub const MIN_PRIORITY: i64 = -20;
pub const MAX_PRIORITY: i64 = 19;

pub fn check_task_function_name(name: &str) -> Result<(), SpindleError> {
    if name.is_empty() {
        return Err(SpindleError::InvalidArgument(
            "task function name must not be an empty string".to_string(),
        ));
    }
    if name.trim().is_empty() {
        return Err(SpindleError::InvalidArgument(
            "task function name must not be blank".to_string(),
        ));
    }
    Ok(())
}

pub fn check_valid_priority(priority: Option<i64>) -> Result<(), SpindleError> {
    let Some(priority) = priority else {
        return Ok(());
    };
    if !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&priority) {
        return Err(SpindleError::InvalidArgument(format!(
            "priority {priority} is not a safe integer"
        )));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(SpindleError::OutOfRange(format!(
            "priority {priority} must be between {MIN_PRIORITY} and {MAX_PRIORITY}"
        )));
    }
    Ok(())
}

/// Name, priority and strategy checks for one registry entry.
///
/// Callability and strategy membership are carried by the types.
pub fn check_valid_task_function_object_entry(
    name: &str,
    entry: &TaskFunctionObject,
) -> Result<(), SpindleError> {
    check_task_function_name(name)?;
    check_valid_priority(entry.priority)
}

fn check_max_inactive_time(max_inactive_time: u64) -> Result<(), SpindleError> {
    if max_inactive_time > MAX_SAFE_INTEGER as u64 {
        return Err(SpindleError::InvalidArgument(
            "maxInactiveTime option is not a safe integer".to_string(),
        ));
    }
    if max_inactive_time < MIN_MAX_INACTIVE_TIME_MS {
        return Err(SpindleError::InvalidArgument(format!(
            "maxInactiveTime option is not a positive integer greater or equal than {MIN_MAX_INACTIVE_TIME_MS}"
        )));
    }
    Ok(())
}

/// Check a raw options record before it is decoded.
pub fn check_valid_worker_options(record: &Value) -> Result<(), SpindleError> {
    let Some(fields) = record.as_object() else {
        return Err(SpindleError::InvalidArgument(
            "worker options must be a plain object".to_string(),
        ));
    };

    if let Some(kill_behavior) = fields.get("killBehavior")
        && serde_json::from_value::<KillBehavior>(kill_behavior.clone()).is_err()
    {
        return Err(SpindleError::InvalidArgument(format!(
            "killBehavior option {kill_behavior} is not valid"
        )));
    }

    if let Some(max_inactive_time) = fields.get("maxInactiveTime") {
        match max_inactive_time.as_u64() {
            Some(ms) => check_max_inactive_time(ms)?,
            None if max_inactive_time.as_i64().is_some() => {
                return Err(SpindleError::InvalidArgument(format!(
                    "maxInactiveTime option is not a positive integer greater or equal than {MIN_MAX_INACTIVE_TIME_MS}"
                )));
            }
            None => {
                return Err(SpindleError::InvalidArgument(
                    "maxInactiveTime option is not an integer".to_string(),
                ));
            }
        }
    }

    if fields.contains_key("killHandler") {
        return Err(SpindleError::InvalidArgument(
            "killHandler option is not a function".to_string(),
        ));
    }
    Ok(())
}

/// Numeric checks on already-typed options.
pub fn check_worker_options(options: &WorkerOptions) -> Result<(), SpindleError> {
    check_max_inactive_time(options.max_inactive_time)
}

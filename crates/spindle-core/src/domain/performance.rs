use serde::{Deserialize, Serialize};

/// Which performance fields the coordinator wants on every task result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerStatistics {
    pub requires_run_time: bool,
    pub requires_utilization: bool,
}

/// Performance record attached to one task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPerformance {
    pub task_name: String,

    /// Wall-clock start, milliseconds since the Unix epoch.
    pub start_timestamp: f64,

    /// Milliseconds spent in the task function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<f64>,

    /// Share of wall time since the previous completion spent in this task, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statistics_accept_partial_records() {
        let s: WorkerStatistics = serde_json::from_value(json!({ "requiresRunTime": true })).unwrap();
        assert!(s.requires_run_time);
        assert!(!s.requires_utilization);
    }

    #[test]
    fn performance_omits_unmeasured_fields() {
        let p = TaskPerformance {
            task_name: "default".to_string(),
            start_timestamp: 1.0,
            run_time: None,
            utilization: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({ "taskName": "default", "startTimestamp": 1.0 }));
    }
}

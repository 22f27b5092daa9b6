// ABOUTME: Value types crossing the port boundary.
// ABOUTME: Task parameters, pod summaries, and live service snapshots.

use crate::types::labels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Caller-supplied parameters for one strategy run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParams {
    pub namespace: String,

    /// Overall steady-state timeout for managed workloads.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Custom workloads get their own, usually longer, budget.
    #[serde(with = "humantime_serde", default = "default_custom_workload_timeout")]
    pub custom_workload_timeout: Duration,
}

fn default_custom_workload_timeout() -> Duration {
    Duration::from_secs(600)
}

impl TaskParams {
    pub fn new(namespace: &str, timeout: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            timeout,
            custom_workload_timeout: default_custom_workload_timeout(),
        }
    }
}

/// A pod as reported by the cluster. `new_pod` is filled in by controllers
/// comparing pod sets before and after apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default)]
    pub new_pod: bool,
}

/// A live service's identity and pod selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

impl ServiceInfo {
    /// The blue/green color this service currently selects, if any.
    pub fn color_selector(&self) -> Option<&str> {
        self.selector.get(labels::COLOR).map(String::as_str)
    }
}

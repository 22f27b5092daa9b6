// ABOUTME: A single numbered release attempt and everything recorded about it.
// ABOUTME: Resource identities, per-workload revisions, custom workload manifests, color.

use crate::manifest::{Resource, ResourceId};
use crate::types::Color;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// A managed workload together with the rollout revision it reached, as
/// reported by the cluster after apply. Revisions drive rollback undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRevision {
    pub workload: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub number: u64,
    pub status: ReleaseStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<ResourceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_workloads: Vec<WorkloadRevision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_workloads: Vec<Resource>,
    /// Full manifests, recorded in the declarative format and whenever
    /// pruning may later need to re-apply them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub canary: bool,
}

impl Release {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            status: ReleaseStatus::InProgress,
            created_at: Utc::now(),
            resource_ids: Vec::new(),
            managed_workloads: Vec::new(),
            custom_workloads: Vec::new(),
            resources: Vec::new(),
            color: None,
            canary: false,
        }
    }

    pub fn versioned_resource_ids(&self) -> Vec<ResourceId> {
        self.resource_ids
            .iter()
            .filter(|id| id.versioned)
            .cloned()
            .collect()
    }

    pub fn workload_ids(&self) -> Vec<ResourceId> {
        self.managed_workloads
            .iter()
            .map(|w| w.workload.clone())
            .collect()
    }

    /// Refreshes recorded rollout revisions after a status check.
    pub fn set_revision(&mut self, workload: &ResourceId, revision: String) {
        for entry in &mut self.managed_workloads {
            if entry.workload.same_object(workload) {
                entry.revision = Some(revision);
                return;
            }
        }
    }
}

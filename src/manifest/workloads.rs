// ABOUTME: Workload classification over parsed resources.
// ABOUTME: Managed native kinds, custom (CRD) workloads, and blue/green/canary eligibility.

use super::resource::Resource;
use crate::types::labels;
use thiserror::Error;

/// Native kinds whose rollout this engine manages.
pub const MANAGED_WORKLOAD_KINDS: [&str; 4] =
    ["Deployment", "StatefulSet", "DaemonSet", "DeploymentConfig"];

/// Kinds eligible to be the single blue/green or canary workload.
const COLORABLE_WORKLOAD_KINDS: [&str; 3] = ["Deployment", "DeploymentConfig", "StatefulSet"];

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error(
        "custom workload {0} has no pidalio.io/steady-state-condition annotation; \
         a managed custom workload must declare how to detect steady state"
    )]
    MissingSteadyStateCondition(String),
}

/// True for native workload kinds not opted out via the direct-apply annotation.
pub fn is_managed_workload(resource: &Resource) -> bool {
    MANAGED_WORKLOAD_KINDS.contains(&resource.kind())
        && !resource.annotation_flag(labels::DIRECT_APPLY)
}

/// True for custom resources explicitly annotated as managed workloads.
pub fn is_custom_workload(resource: &Resource) -> bool {
    !MANAGED_WORKLOAD_KINDS.contains(&resource.kind())
        && resource.annotation_flag(labels::MANAGED_WORKLOAD)
        && !resource.annotation_flag(labels::DIRECT_APPLY)
}

/// Splits resources into (managed native workloads, custom workloads).
pub fn partition_workloads(resources: &[Resource]) -> (Vec<Resource>, Vec<Resource>) {
    let managed = resources
        .iter()
        .filter(|r| is_managed_workload(r))
        .cloned()
        .collect();
    let custom = resources
        .iter()
        .filter(|r| is_custom_workload(r))
        .cloned()
        .collect();
    (managed, custom)
}

/// True for workloads a blue/green or canary deployment may operate on.
pub fn is_eligible_workload(resource: &Resource) -> bool {
    COLORABLE_WORKLOAD_KINDS.contains(&resource.kind())
        && !resource.annotation_flag(labels::DIRECT_APPLY)
}

/// Workloads a blue/green or canary deployment may operate on.
pub fn eligible_workloads(resources: &[Resource]) -> Vec<&Resource> {
    resources.iter().filter(|r| is_eligible_workload(r)).collect()
}

/// Custom workloads must say how their steady state is detected.
pub fn check_steady_state_condition(custom: &[Resource]) -> Result<(), WorkloadError> {
    for workload in custom {
        if workload.annotation(labels::STEADY_STATE_CONDITION).is_none() {
            return Err(WorkloadError::MissingSteadyStateCondition(
                workload.id.kind_name(),
            ));
        }
    }
    Ok(())
}

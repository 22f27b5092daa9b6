// ABOUTME: Parsed Kubernetes manifests and the transforms applied before a rollout.
// ABOUTME: Resource identity, multi-doc YAML parsing, workload partitioning, kind ordering.

mod order;
mod parse;
mod resource;
mod transform;
mod workloads;

pub use order::{deletion_order, kind_rank};
pub use parse::{parse_manifests, set_default_namespace, ManifestError};
pub use resource::{Resource, ResourceId, ResourceRefError};
pub use transform::{
    canary_workload, color_service, color_workload, replicas, set_replicas,
    stage_service_from_primary, stamp_release_labels, stamp_stable_track, version_resources,
};
pub use workloads::{
    check_steady_state_condition, eligible_workloads, is_custom_workload, is_eligible_workload,
    is_managed_workload, partition_workloads, WorkloadError, MANAGED_WORKLOAD_KINDS,
};

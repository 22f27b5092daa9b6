// ABOUTME: Cluster operation traits consumed by the strategy controllers.
// ABOUTME: One trait per concern; ClusterOps bundles them for injection as a single object.

use super::types::{PodInfo, ServiceInfo, TaskParams};
use crate::manifest::{Resource, ResourceId};
use crate::types::{Color, Track};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("command failed with exit code {exit_code}: {command}\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("cluster API request failed: {0}")]
    Api(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// Applying manifests to the cluster.
#[async_trait]
pub trait ApplyOps: Send + Sync {
    async fn apply(&self, resources: &[Resource], params: &TaskParams)
        -> Result<(), ClusterError>;

    /// Server-side validation without persisting anything.
    async fn dry_run(
        &self,
        resources: &[Resource],
        params: &TaskParams,
    ) -> Result<(), ClusterError>;
}

/// Deleting resources. Implementations treat "not found" as success.
#[async_trait]
pub trait DeleteOps: Send + Sync {
    async fn delete(&self, ids: &[ResourceId], params: &TaskParams) -> Result<(), ClusterError>;

    /// Deletes one id at a time, swallowing per-resource failures, and
    /// reports which ids were actually deleted.
    async fn delete_handling_partial_execution(
        &self,
        ids: &[ResourceId],
        params: &TaskParams,
    ) -> Result<Vec<ResourceId>, ClusterError>;
}

/// Workload rollout operations.
#[async_trait]
pub trait WorkloadOps: Send + Sync {
    /// Waits until the workloads reach steady state. `Ok(false)` means the
    /// wait ran to completion but the workloads never became ready.
    async fn status_check(
        &self,
        workloads: &[ResourceId],
        params: &TaskParams,
    ) -> Result<bool, ClusterError>;

    /// Steady-state wait for custom workloads, driven by their declared
    /// condition and the custom workload timeout.
    async fn status_check_custom(
        &self,
        workloads: &[Resource],
        params: &TaskParams,
    ) -> Result<bool, ClusterError>;

    /// Current rollout revision as reported by the cluster.
    async fn latest_revision(
        &self,
        workload: &ResourceId,
        params: &TaskParams,
    ) -> Result<String, ClusterError>;

    /// `rollout undo`, to a specific recorded revision when one is given.
    async fn rollout_undo(
        &self,
        workload: &ResourceId,
        revision: Option<&str>,
        params: &TaskParams,
    ) -> Result<(), ClusterError>;

    /// Live replica count; `None` when the workload does not exist.
    async fn current_replicas(
        &self,
        workload: &ResourceId,
        params: &TaskParams,
    ) -> Result<Option<u32>, ClusterError>;

    async fn scale(
        &self,
        workload: &ResourceId,
        replicas: u32,
        params: &TaskParams,
    ) -> Result<(), ClusterError>;

    /// Whether the live object carries the direct-apply annotation.
    async fn is_direct_apply(
        &self,
        id: &ResourceId,
        params: &TaskParams,
    ) -> Result<bool, ClusterError>;
}

/// Listing pods that belong to a release.
#[async_trait]
pub trait PodOps: Send + Sync {
    async fn pods(
        &self,
        namespace: &str,
        release_name: &str,
        timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError>;

    async fn pods_with_color(
        &self,
        namespace: &str,
        release_name: &str,
        color: Color,
        timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError>;

    async fn pods_with_track(
        &self,
        namespace: &str,
        release_name: &str,
        track: Track,
        timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError>;
}

/// Reading services and rewriting their selectors during blue/green.
#[async_trait]
pub trait ServiceOps: Send + Sync {
    /// `None` when the service does not exist.
    async fn service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInfo>, ClusterError>;

    /// Replaces the service's pod selector, leaving the rest of the live
    /// object untouched.
    async fn patch_service_selector(
        &self,
        namespace: &str,
        name: &str,
        selector: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), ClusterError>;
}

/// The full cluster surface controllers are built against.
pub trait ClusterOps:
    ApplyOps + DeleteOps + WorkloadOps + PodOps + ServiceOps
{
}

impl<T: ApplyOps + DeleteOps + WorkloadOps + PodOps + ServiceOps> ClusterOps for T {}

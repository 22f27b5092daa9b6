// ABOUTME: Failure taxonomy for the strategy controllers.
// ABOUTME: Manifest and data errors carry the user-facing message; port failures keep their output.

use crate::manifest::{ManifestError, ResourceRefError, WorkloadError};
use crate::ports::ClusterError;
use crate::release::{HistoryError, ReleaseError};
use crate::types::ColorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    /// A request reached the wrong controller. Programming error, not retried.
    #[error("wrong request type passed to the {strategy} strategy")]
    Contract { strategy: &'static str },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error(transparent)]
    ResourceRef(#[from] ResourceRefError),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Color(#[from] ColorError),

    #[error("no service found in manifests; blue/green needs a primary service")]
    NoServiceFound,

    #[error(
        "could not locate a primary service in manifests; found {count} services, \
         annotate one with pidalio.io/primary-service: true"
    )]
    AmbiguousPrimaryService { count: usize },

    #[error(
        "found conflicting service '{name}' in the cluster: its selector carries no \
         pidalio.io/color label; delete or relabel it before deploying blue/green"
    )]
    ConflictingService { name: String },

    #[error(
        "no workload found in manifests; {strategy} requires exactly one eligible \
         Deployment, DeploymentConfig or StatefulSet"
    )]
    NoEligibleWorkload { strategy: &'static str },

    #[error(
        "found {count} eligible workloads in manifests; {strategy} supports exactly one, \
         annotate the others with pidalio.io/direct-apply: true to apply them unmanaged"
    )]
    MultipleWorkloads {
        strategy: &'static str,
        count: usize,
    },

    #[error("service '{name}' not found in namespace {namespace}")]
    ServiceNotFound { name: String, namespace: String },

    #[error("workload {reference} not found in namespace {namespace}")]
    WorkloadNotFound {
        reference: String,
        namespace: String,
    },

    #[error("dry run failed: {0}")]
    DryRun(#[source] ClusterError),

    #[error("apply failed: {0}")]
    Apply(#[source] ClusterError),

    #[error("workloads did not reach steady state")]
    NotSteady,

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

// ABOUTME: Async port traits for everything that touches the cluster or a backing store.
// ABOUTME: Controllers depend on these traits; kubectl/API adapters live outside this crate.

mod cluster;
mod store;
mod types;

pub use cluster::{
    ApplyOps, ClusterError, ClusterOps, DeleteOps, PodOps, ServiceOps, WorkloadOps,
};
pub use store::{LegacyReleaseStore, ReleaseObjectStore, StoreError};
pub use types::{PodInfo, ServiceInfo, TaskParams};

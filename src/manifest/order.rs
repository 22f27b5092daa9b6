// ABOUTME: Kind ordering for safe resource creation and deletion.
// ABOUTME: Deletion runs in reverse creation order so namespaces and cluster scaffolding go last.

use super::resource::ResourceId;

// Creation order; kinds not listed sort after every listed kind.
const KIND_CREATION_ORDER: [&str; 27] = [
    "Namespace",
    "ResourceQuota",
    "LimitRange",
    "PodSecurityPolicy",
    "Secret",
    "ConfigMap",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "ServiceAccount",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleBinding",
    "Role",
    "RoleBinding",
    "Service",
    "DaemonSet",
    "Pod",
    "ReplicationController",
    "ReplicaSet",
    "Deployment",
    "DeploymentConfig",
    "StatefulSet",
    "HorizontalPodAutoscaler",
    "PodDisruptionBudget",
    "Job",
    "CronJob",
];

pub fn kind_rank(kind: &str) -> usize {
    KIND_CREATION_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(KIND_CREATION_ORDER.len())
}

/// Arranges ids so dependents are deleted before what they depend on.
pub fn deletion_order(ids: &[ResourceId]) -> Vec<ResourceId> {
    let mut ordered = ids.to_vec();
    ordered.sort_by(|a, b| kind_rank(&b.kind).cmp(&kind_rank(&a.kind)));
    ordered
}

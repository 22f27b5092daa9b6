// ABOUTME: Computes which resources from the previous successful release can be pruned.
// ABOUTME: Versioned and skip-pruning resources survive; without stored manifests nothing is pruned.

use crate::manifest::ResourceId;
use crate::release::Release;
use crate::types::labels;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of recreating previously pruned resources during a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceRecreationStatus {
    NoResourceCreated,
    CreationFailed,
    CreationSuccessful,
}

/// Resources recorded by `previous` that the current release no longer
/// deploys. Versioned resources never qualify; the skip-pruning annotation is
/// honored via the previous release's stored manifests. Without stored
/// manifests the annotation cannot be checked, so nothing is pruned.
pub fn prunable_resources(previous: &Release, current_ids: &[ResourceId]) -> Vec<ResourceId> {
    if previous.resources.is_empty() && !previous.resource_ids.is_empty() {
        warn!(
            number = previous.number,
            "previous release has no stored manifests, skipping pruning"
        );
        return Vec::new();
    }

    previous
        .resource_ids
        .iter()
        .filter(|id| !id.versioned)
        .filter(|id| !current_ids.iter().any(|current| current.same_object(id)))
        .filter(|id| {
            previous
                .resources
                .iter()
                .find(|r| r.id.same_object(id))
                .is_none_or(|r| !r.annotation_flag(labels::SKIP_PRUNING))
        })
        .cloned()
        .collect()
}

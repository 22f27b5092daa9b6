// ABOUTME: Deletes an explicit resource list or everything recorded for a release.
// ABOUTME: Runs in safe deletion order; namespaces only go when explicitly requested.

use super::error::DeployError;
use crate::manifest::{deletion_order, ResourceId};
use crate::ports::{ClusterOps, TaskParams};
use crate::release::ReleaseHandler;
use crate::types::ReleaseName;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub release_name: ReleaseName,
    /// Comma-separated `Kind/name` references. When absent, the latest
    /// release's recorded resources are deleted instead.
    pub resource_refs: Option<String>,
    /// Namespace objects are skipped unless explicitly requested.
    pub delete_namespaces: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<ResourceId>,
}

pub struct DeleteResources<'a> {
    cluster: &'a dyn ClusterOps,
    releases: &'a dyn ReleaseHandler,
}

impl<'a> DeleteResources<'a> {
    pub fn new(cluster: &'a dyn ClusterOps, releases: &'a dyn ReleaseHandler) -> Self {
        Self { cluster, releases }
    }

    pub async fn run(
        &self,
        request: DeleteRequest,
        params: &TaskParams,
    ) -> Result<DeleteOutcome, DeployError> {
        let mut ids = match request.resource_refs.as_deref().map(str::trim) {
            Some(refs) if !refs.is_empty() => refs
                .split(',')
                .map(|r| ResourceId::from_ref(r.trim(), &params.namespace))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                let history = self.releases.release_history(&request.release_name).await?;
                match history.latest() {
                    Some(latest) => latest.resource_ids.clone(),
                    None => {
                        info!(release = %request.release_name, "no release data found, nothing to delete");
                        return Ok(DeleteOutcome { deleted: Vec::new() });
                    }
                }
            }
        };

        if !request.delete_namespaces {
            let before = ids.len();
            ids.retain(|id| id.kind != "Namespace");
            if ids.len() < before {
                warn!("skipping namespace deletion, not explicitly requested");
            }
        }

        if ids.is_empty() {
            return Ok(DeleteOutcome { deleted: Vec::new() });
        }

        let ordered = deletion_order(&ids);
        let deleted = self
            .cluster
            .delete_handling_partial_execution(&ordered, params)
            .await?;
        info!(release = %request.release_name, count = deleted.len(), "deleted resources");
        Ok(DeleteOutcome { deleted })
    }
}

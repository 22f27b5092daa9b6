// ABOUTME: Scales a single workload to an absolute count or a percentage of its current size.
// ABOUTME: Reports the pod sets before and after so callers can show what changed.

use super::error::DeployError;
use crate::manifest::ResourceId;
use crate::ports::{ClusterOps, PodInfo, TaskParams};
use crate::types::ReleaseName;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleTarget {
    Count(u32),
    /// Percentage of the workload's current replica count. Unlike canary
    /// targets, scaling to zero is legitimate.
    Percentage(u32),
}

#[derive(Debug, Clone)]
pub struct ScaleRequest {
    pub release_name: ReleaseName,
    /// `Kind/name` reference of the workload to scale.
    pub workload_ref: String,
    pub target: ScaleTarget,
    pub skip_steady_state_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleOutcome {
    pub workload: ResourceId,
    pub replicas: u32,
    pub pods_before: Vec<PodInfo>,
    pub pods_after: Vec<PodInfo>,
}

pub struct ScaleWorkload<'a> {
    cluster: &'a dyn ClusterOps,
}

impl<'a> ScaleWorkload<'a> {
    pub fn new(cluster: &'a dyn ClusterOps) -> Self {
        Self { cluster }
    }

    pub async fn run(
        &self,
        request: ScaleRequest,
        params: &TaskParams,
    ) -> Result<ScaleOutcome, DeployError> {
        let workload = ResourceId::from_ref(&request.workload_ref, &params.namespace)?;

        let current = self
            .cluster
            .current_replicas(&workload, params)
            .await?
            .ok_or_else(|| DeployError::WorkloadNotFound {
                reference: workload.kind_name(),
                namespace: params.namespace.clone(),
            })?;

        let replicas = match request.target {
            ScaleTarget::Count(count) => count,
            ScaleTarget::Percentage(percentage) => {
                (f64::from(percentage) / 100.0 * f64::from(current)).round() as u32
            }
        };

        let pods_before = self
            .cluster
            .pods(
                &params.namespace,
                request.release_name.as_str(),
                params.timeout,
            )
            .await?;

        info!(workload = %workload, from = current, to = replicas, "scaling workload");
        self.cluster.scale(&workload, replicas, params).await?;

        if !request.skip_steady_state_check {
            match self
                .cluster
                .status_check(std::slice::from_ref(&workload), params)
                .await
            {
                Ok(true) => {}
                Ok(false) => return Err(DeployError::NotSteady),
                Err(error) => return Err(DeployError::Cluster(error)),
            }
        }

        let mut pods_after = self
            .cluster
            .pods(
                &params.namespace,
                request.release_name.as_str(),
                params.timeout,
            )
            .await?;
        for pod in &mut pods_after {
            pod.new_pod = !pods_before.iter().any(|p| p.name == pod.name);
        }

        Ok(ScaleOutcome {
            workload,
            replicas,
            pods_before,
            pods_after,
        })
    }
}

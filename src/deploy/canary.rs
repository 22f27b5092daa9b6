// ABOUTME: Canary deployment controller, instance math, and canary workload cleanup.
// ABOUTME: Deploys a scaled -canary clone and leaves the release in progress for later promotion.

use super::error::DeployError;
use crate::manifest::{
    self, deletion_order, is_eligible_workload, parse_manifests, set_default_namespace, Resource,
    ResourceId,
};
use crate::ports::{ClusterOps, PodInfo, TaskParams};
use crate::release::{ReleaseHandler, ReleaseHistory, ReleaseStatus, WorkloadRevision};
use crate::types::{labels, ReleaseName, Track};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STRATEGY: &str = "canary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanaryInstances {
    Count(u32),
    Percentage(u32),
}

#[derive(Debug, Clone)]
pub struct CanaryRequest {
    pub release_name: ReleaseName,
    pub manifests: Vec<String>,
    pub instances: CanaryInstances,
    /// Basis for percentage targets; when absent the live replica count of
    /// the stable workload is used, falling back to the manifest.
    pub max_instances: Option<u32>,
    pub skip_dry_run: bool,
    pub skip_versioning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryOutcome {
    pub release_number: u64,
    pub canary_workload: ResourceId,
    pub target_instances: u32,
    pub pods: Vec<PodInfo>,
}

/// Instance count for a percentage-based canary. Anything that rounds below
/// one instance is bumped up to one.
pub fn target_instances(percentage: u32, basis: u32) -> u32 {
    let computed = (f64::from(percentage) / 100.0 * f64::from(basis)).round() as u32;
    if computed < 1 {
        info!(percentage, basis, "canary target computed below one instance, bumping up to 1");
        1
    } else {
        computed
    }
}

pub struct CanaryDeploy<'a> {
    cluster: &'a dyn ClusterOps,
    releases: &'a dyn ReleaseHandler,
}

struct CanaryRun {
    params: TaskParams,
    release_name: ReleaseName,
    resources: Vec<Resource>,
    canary_id: ResourceId,
    target: u32,
    history: ReleaseHistory,
    release_number: u64,
    existing_pods: Vec<PodInfo>,
}

impl<'a> CanaryDeploy<'a> {
    pub fn new(cluster: &'a dyn ClusterOps, releases: &'a dyn ReleaseHandler) -> Self {
        Self { cluster, releases }
    }

    pub async fn run(
        &self,
        request: CanaryRequest,
        params: &TaskParams,
    ) -> Result<CanaryOutcome, DeployError> {
        let resources = self.init(&request, params).await?;
        let mut run = self.prepare(request, params, resources).await?;

        if let Err(error) = self.apply(&run).await {
            self.persist_failed(&mut run).await;
            return Err(error);
        }
        if let Err(error) = self.steady_state(&mut run).await {
            self.persist_failed(&mut run).await;
            return Err(error);
        }
        self.wrap_up(&mut run).await
    }

    async fn init(
        &self,
        request: &CanaryRequest,
        params: &TaskParams,
    ) -> Result<Vec<Resource>, DeployError> {
        let mut resources = parse_manifests(&request.manifests)?;
        set_default_namespace(&mut resources, &params.namespace);
        if !request.skip_dry_run {
            self.cluster
                .dry_run(&resources, params)
                .await
                .map_err(DeployError::DryRun)?;
        }
        Ok(resources)
    }

    async fn prepare(
        &self,
        request: CanaryRequest,
        params: &TaskParams,
        resources: Vec<Resource>,
    ) -> Result<CanaryRun, DeployError> {
        let mut history = self.releases.release_history(&request.release_name).await?;
        let release_number = history.next_release_number();

        let mut resources = manifest::version_resources(
            &resources,
            release_number,
            request.skip_versioning,
        );
        resources = manifest::stamp_release_labels(&resources, &request.release_name, release_number);

        let eligible: Vec<usize> = resources
            .iter()
            .enumerate()
            .filter(|(_, r)| is_eligible_workload(r))
            .map(|(i, _)| i)
            .collect();
        let workload_index = match eligible.as_slice() {
            [] => return Err(DeployError::NoEligibleWorkload { strategy: STRATEGY }),
            [index] => *index,
            many => {
                return Err(DeployError::MultipleWorkloads {
                    strategy: STRATEGY,
                    count: many.len(),
                })
            }
        };

        let target = match request.instances {
            CanaryInstances::Count(count) => count,
            CanaryInstances::Percentage(percentage) => {
                let basis = self
                    .percentage_basis(&resources[workload_index], request.max_instances, params)
                    .await?;
                target_instances(percentage, basis)
            }
        };

        // The stable workload is not touched by a canary rollout; its slot in
        // the manifest set becomes the canary clone.
        resources[workload_index] = manifest::canary_workload(&resources[workload_index], target);
        let canary_id = resources[workload_index].id.clone();

        let mut release = self.releases.create_release(&history);
        release.resource_ids = resources.iter().map(|r| r.id.clone()).collect();
        release.managed_workloads = vec![WorkloadRevision {
            workload: canary_id.clone(),
            revision: None,
        }];
        release.resources = resources.clone();
        release.canary = true;
        history.add(release)?;

        let existing_pods = self
            .cluster
            .pods_with_track(
                &params.namespace,
                request.release_name.as_str(),
                Track::Canary,
                params.timeout,
            )
            .await?;

        info!(
            release = %request.release_name,
            number = release_number,
            target,
            "prepared canary release"
        );

        Ok(CanaryRun {
            params: params.clone(),
            release_name: request.release_name,
            resources,
            canary_id,
            target,
            history,
            release_number,
            existing_pods,
        })
    }

    /// Basis for a percentage target: explicit max instances, else the live
    /// replica count of the stable workload, else its manifest replicas.
    async fn percentage_basis(
        &self,
        workload: &Resource,
        max_instances: Option<u32>,
        params: &TaskParams,
    ) -> Result<u32, DeployError> {
        if let Some(basis) = max_instances {
            return Ok(basis);
        }
        if let Some(live) = self.cluster.current_replicas(&workload.id, params).await? {
            return Ok(live);
        }
        Ok(manifest::replicas(workload).unwrap_or(1))
    }

    async fn apply(&self, run: &CanaryRun) -> Result<(), DeployError> {
        self.cluster
            .apply(&run.resources, &run.params)
            .await
            .map_err(DeployError::Apply)
    }

    async fn steady_state(&self, run: &mut CanaryRun) -> Result<(), DeployError> {
        let workloads = vec![run.canary_id.clone()];
        let result = match self.cluster.status_check(&workloads, &run.params).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeployError::NotSteady),
            Err(error) => Err(DeployError::Cluster(error)),
        };

        match self
            .cluster
            .latest_revision(&run.canary_id, &run.params)
            .await
        {
            Ok(revision) => {
                if let Some(release) = run.history.find_mut(run.release_number) {
                    release.set_revision(&run.canary_id, revision);
                }
            }
            Err(error) => {
                warn!(workload = %run.canary_id, error = %error, "failed to read rollout revision");
            }
        }
        result
    }

    /// The release is deliberately left in progress: promotion (a rolling
    /// deploy in the same workflow) or canary delete decides its fate.
    async fn wrap_up(&self, run: &mut CanaryRun) -> Result<CanaryOutcome, DeployError> {
        let mut pods = match self
            .cluster
            .pods_with_track(
                &run.params.namespace,
                run.release_name.as_str(),
                Track::Canary,
                run.params.timeout,
            )
            .await
        {
            Ok(pods) => pods,
            Err(error) => {
                self.persist_failed(run).await;
                return Err(error.into());
            }
        };
        for pod in &mut pods {
            pod.new_pod = !run.existing_pods.iter().any(|p| p.name == pod.name);
        }

        self.releases.save(&run.release_name, &run.history).await?;
        info!(
            release = %run.release_name,
            number = run.release_number,
            target = run.target,
            "canary release deployed, awaiting verification"
        );

        Ok(CanaryOutcome {
            release_number: run.release_number,
            canary_workload: run.canary_id.clone(),
            target_instances: run.target,
            pods,
        })
    }

    async fn persist_failed(&self, run: &mut CanaryRun) {
        if let Some(release) = run.history.find_mut(run.release_number) {
            release.status = ReleaseStatus::Failed;
        }
        if let Err(error) = self.releases.save(&run.release_name, &run.history).await {
            warn!(release = %run.release_name, error = %error, "failed to persist failed release");
        }
    }
}

/// Removes the canary workloads of an unpromoted release.
pub struct CanaryDelete<'a> {
    cluster: &'a dyn ClusterOps,
    releases: &'a dyn ReleaseHandler,
}

impl<'a> CanaryDelete<'a> {
    pub fn new(cluster: &'a dyn ClusterOps, releases: &'a dyn ReleaseHandler) -> Self {
        Self { cluster, releases }
    }

    pub async fn run(
        &self,
        release_name: &ReleaseName,
        params: &TaskParams,
    ) -> Result<Vec<ResourceId>, DeployError> {
        let history = self.releases.release_history(release_name).await?;
        let Some(latest) = history.latest() else {
            info!(release = %release_name, "no releases found, nothing to delete");
            return Ok(Vec::new());
        };
        if latest.status == ReleaseStatus::Succeeded {
            info!(
                release = %release_name,
                number = latest.number,
                "latest release succeeded, no canary workloads to delete"
            );
            return Ok(Vec::new());
        }

        let canary_ids: Vec<ResourceId> = latest
            .resource_ids
            .iter()
            .filter(|id| id.name.ends_with(labels::CANARY_SUFFIX))
            .cloned()
            .collect();
        if canary_ids.is_empty() {
            info!(release = %release_name, "no canary workloads recorded, nothing to delete");
            return Ok(Vec::new());
        }

        let ordered = deletion_order(&canary_ids);
        self.cluster.delete(&ordered, params).await?;
        info!(
            release = %release_name,
            count = ordered.len(),
            "deleted canary workloads"
        );
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_half_away_from_zero() {
        assert_eq!(target_instances(70, 4), 3);
        assert_eq!(target_instances(50, 5), 3);
        assert_eq!(target_instances(25, 4), 1);
        assert_eq!(target_instances(100, 4), 4);
    }

    #[test]
    fn sub_one_targets_bump_to_one() {
        assert_eq!(target_instances(10, 2), 1);
        assert_eq!(target_instances(1, 1), 1);
        assert_eq!(target_instances(0, 10), 1);
    }

    proptest::proptest! {
        #[test]
        fn target_is_always_at_least_one(percentage in 0u32..=100, basis in 0u32..=1000) {
            proptest::prop_assert!(target_instances(percentage, basis) >= 1);
        }

        #[test]
        fn full_percentage_is_identity_above_zero(basis in 1u32..=1000) {
            proptest::prop_assert_eq!(target_instances(100, basis), basis);
        }
    }
}

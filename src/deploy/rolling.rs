// ABOUTME: Rolling deployment controller.
// ABOUTME: Applies all manifests, waits for steady state, records the release, optionally prunes.

use super::error::DeployError;
use crate::manifest::{
    self, check_steady_state_condition, deletion_order, parse_manifests, partition_workloads,
    set_default_namespace, Resource, ResourceId,
};
use crate::ports::{ClusterOps, PodInfo, TaskParams};
use crate::release::{Release, ReleaseHandler, ReleaseHistory, ReleaseStatus, WorkloadRevision};
use crate::rollback::prunable_resources;
use crate::types::ReleaseName;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RollingRequest {
    pub release_name: ReleaseName,
    /// Rendered manifest files, each possibly multi-document.
    pub manifests: Vec<String>,
    pub skip_dry_run: bool,
    pub skip_versioning: bool,
    pub prune: bool,
    /// Set when this rollout promotes a canary: the in-progress canary
    /// release is reused instead of opening a new number.
    pub in_canary_workflow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingOutcome {
    pub release_number: u64,
    pub workloads: Vec<ResourceId>,
    pub pods: Vec<PodInfo>,
    pub pruned: Vec<ResourceId>,
}

pub struct RollingDeploy<'a> {
    cluster: &'a dyn ClusterOps,
    releases: &'a dyn ReleaseHandler,
}

struct RollingRun {
    params: TaskParams,
    release_name: ReleaseName,
    resources: Vec<Resource>,
    managed_ids: Vec<ResourceId>,
    custom: Vec<Resource>,
    history: ReleaseHistory,
    release_number: u64,
    previous_successful: Option<Release>,
    existing_pods: Vec<PodInfo>,
    prune: bool,
}

impl<'a> RollingDeploy<'a> {
    pub fn new(cluster: &'a dyn ClusterOps, releases: &'a dyn ReleaseHandler) -> Self {
        Self { cluster, releases }
    }

    pub async fn run(
        &self,
        request: RollingRequest,
        params: &TaskParams,
    ) -> Result<RollingOutcome, DeployError> {
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

    /// Parse, default namespaces, validate server-side. Nothing is persisted
    /// when this phase fails.
    async fn init(
        &self,
        request: &RollingRequest,
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
        request: RollingRequest,
        params: &TaskParams,
        resources: Vec<Resource>,
    ) -> Result<RollingRun, DeployError> {
        let mut history = self.releases.release_history(&request.release_name).await?;
        let previous_successful = history.last_successful().cloned();

        // Promoting a canary continues its release instead of opening a new one.
        let reuse_canary = request.in_canary_workflow
            && history
                .latest()
                .is_some_and(|r| r.canary && r.status == ReleaseStatus::InProgress);
        let release_number = if reuse_canary {
            history.latest().map_or(1, |r| r.number)
        } else {
            history.next_release_number()
        };

        let transformed = manifest::version_resources(
            &resources,
            release_number,
            request.skip_versioning,
        );
        let transformed =
            manifest::stamp_release_labels(&transformed, &request.release_name, release_number);
        // A rollout inside a canary workflow is the stable side of the split.
        let transformed = if request.in_canary_workflow {
            manifest::stamp_stable_track(&transformed)
        } else {
            transformed
        };

        let (managed, custom) = partition_workloads(&transformed);
        check_steady_state_condition(&custom)?;

        let ids: Vec<ResourceId> = transformed.iter().map(|r| r.id.clone()).collect();
        let managed_ids: Vec<ResourceId> = managed.iter().map(|r| r.id.clone()).collect();
        let workload_revisions: Vec<WorkloadRevision> = managed
            .iter()
            .map(|w| WorkloadRevision {
                workload: w.id.clone(),
                revision: None,
            })
            .collect();

        if reuse_canary {
            if let Some(latest) = history.latest_mut() {
                for id in &ids {
                    if !latest.resource_ids.iter().any(|e| e.same_object(id)) {
                        latest.resource_ids.push(id.clone());
                    }
                }
                latest.managed_workloads = workload_revisions;
                latest.custom_workloads = custom.clone();
                latest.resources = transformed.clone();
            }
        } else {
            let mut release = self.releases.create_release(&history);
            release.resource_ids = ids;
            release.managed_workloads = workload_revisions;
            release.custom_workloads = custom.clone();
            release.resources = transformed.clone();
            history.add(release)?;
        }

        let existing_pods = self
            .cluster
            .pods(
                &params.namespace,
                request.release_name.as_str(),
                params.timeout,
            )
            .await?;

        info!(
            release = %request.release_name,
            number = release_number,
            workloads = managed_ids.len(),
            "prepared rolling release"
        );

        Ok(RollingRun {
            params: params.clone(),
            release_name: request.release_name,
            resources: transformed,
            managed_ids,
            custom,
            history,
            release_number,
            previous_successful,
            existing_pods,
            prune: request.prune,
        })
    }

    async fn apply(&self, run: &RollingRun) -> Result<(), DeployError> {
        self.cluster
            .apply(&run.resources, &run.params)
            .await
            .map_err(DeployError::Apply)
    }

    /// Waits for steady state. Recorded revisions are refreshed whether the
    /// wait succeeds or not, so a later rollback knows where each workload
    /// ended up.
    async fn steady_state(&self, run: &mut RollingRun) -> Result<(), DeployError> {
        if run.managed_ids.is_empty() && run.custom.is_empty() {
            info!("no workloads found in the manifests, skipping steady state check");
            return Ok(());
        }

        let mut result = Ok(());

        if !run.managed_ids.is_empty() {
            result = match self.cluster.status_check(&run.managed_ids, &run.params).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(DeployError::NotSteady),
                Err(error) => Err(DeployError::Cluster(error)),
            };
        }
        if result.is_ok() && !run.custom.is_empty() {
            result = match self
                .cluster
                .status_check_custom(&run.custom, &run.params)
                .await
            {
                Ok(true) => Ok(()),
                Ok(false) => Err(DeployError::NotSteady),
                Err(error) => Err(DeployError::Cluster(error)),
            };
        }

        self.refresh_revisions(run).await;
        result
    }

    async fn refresh_revisions(&self, run: &mut RollingRun) {
        for id in run.managed_ids.clone() {
            match self.cluster.latest_revision(&id, &run.params).await {
                Ok(revision) => {
                    if let Some(release) = run.history.find_mut(run.release_number) {
                        release.set_revision(&id, revision);
                    }
                }
                Err(error) => {
                    warn!(workload = %id, error = %error, "failed to read rollout revision");
                }
            }
        }
    }

    async fn wrap_up(&self, run: &mut RollingRun) -> Result<RollingOutcome, DeployError> {
        let mut pods = match self
            .cluster
            .pods(
                &run.params.namespace,
                run.release_name.as_str(),
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

        if let Some(release) = run.history.find_mut(run.release_number) {
            release.status = ReleaseStatus::Succeeded;
            release.canary = false;
        }

        let pruned = if run.prune {
            self.prune(run).await
        } else {
            Vec::new()
        };

        self.releases.save(&run.release_name, &run.history).await?;
        info!(
            release = %run.release_name,
            number = run.release_number,
            pruned = pruned.len(),
            "rolling release succeeded"
        );

        Ok(RollingOutcome {
            release_number: run.release_number,
            workloads: run.managed_ids.clone(),
            pods,
            pruned,
        })
    }

    /// Best effort: pruning never fails a successful rollout.
    async fn prune(&self, run: &RollingRun) -> Vec<ResourceId> {
        let Some(previous) = &run.previous_successful else {
            info!("no previous successful release, nothing to prune");
            return Vec::new();
        };

        let current_ids: Vec<ResourceId> = run.resources.iter().map(|r| r.id.clone()).collect();
        let prunable = prunable_resources(previous, &current_ids);
        if prunable.is_empty() {
            info!("no resources eligible for pruning");
            return Vec::new();
        }

        let ordered = deletion_order(&prunable);
        match self
            .cluster
            .delete_handling_partial_execution(&ordered, &run.params)
            .await
        {
            Ok(deleted) => {
                info!(count = deleted.len(), "pruned resources from previous release");
                deleted
            }
            Err(error) => {
                warn!(error = %error, "pruning failed, continuing");
                Vec::new()
            }
        }
    }

    async fn persist_failed(&self, run: &mut RollingRun) {
        if let Some(release) = run.history.find_mut(run.release_number) {
            release.status = ReleaseStatus::Failed;
        }
        if let Err(error) = self.releases.save(&run.release_name, &run.history).await {
            warn!(release = %run.release_name, error = %error, "failed to persist failed release");
        }
    }
}

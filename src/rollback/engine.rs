// ABOUTME: The rollback engine: dual-format init, target resolution, undo, persist.
// ABOUTME: Every data-shaped dead end is a logged no-op; only port failures become errors.

use super::prune::ResourceRecreationStatus;
use crate::manifest::{deletion_order, partition_workloads, Resource, ResourceId};
use crate::ports::{ClusterError, ClusterOps, TaskParams};
use crate::release::{
    Release, ReleaseError, ReleaseHandler, ReleaseHistory, ReleaseStatus, WorkloadRevision,
};
use crate::types::ReleaseName;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("rolled-back workloads did not reach steady state")]
    NotSteady,
}

#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub release_name: ReleaseName,
    /// Number of the failing release. `None` or zero means the deployment was
    /// aborted in progress and the latest release is the one to roll back.
    pub release_number: Option<u64>,
    pub use_declarative_rollback: bool,
    /// Resources pruned by the deployment being rolled back, eligible for
    /// recreation from the target release.
    pub pruned_resource_ids: Vec<ResourceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub rolled_back: bool,
    pub recreation: ResourceRecreationStatus,
    pub recreated: Vec<ResourceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMode {
    Legacy,
    Declarative,
}

/// State threaded through the rollback phases.
pub struct RollbackRun {
    release_name: ReleaseName,
    mode: HistoryMode,
    noop: bool,
    history: ReleaseHistory,
    current_number: Option<u64>,
    /// Latest declarative release converted for the legacy path when the
    /// declarative history has no successful release to offer.
    current_override: Option<Release>,
    bound_override: Option<u64>,
    resources_recreated: Vec<ResourceId>,
    previous_workload_ids: Vec<ResourceId>,
    previous_custom: Vec<Resource>,
}

pub struct Rollback<'a> {
    cluster: &'a dyn ClusterOps,
    declarative: &'a dyn ReleaseHandler,
    legacy: &'a dyn ReleaseHandler,
}

impl<'a> Rollback<'a> {
    pub fn new(
        cluster: &'a dyn ClusterOps,
        declarative: &'a dyn ReleaseHandler,
        legacy: &'a dyn ReleaseHandler,
    ) -> Self {
        Self {
            cluster,
            declarative,
            legacy,
        }
    }

    pub async fn run(
        &self,
        request: RollbackRequest,
        params: &TaskParams,
    ) -> Result<RollbackOutcome, RollbackError> {
        let mut run = self.init(&request).await?;
        let recreation = self
            .recreate_pruned_resources(&mut run, &request.pruned_resource_ids, params)
            .await;
        self.delete_new_resources_for_failed_release(&run, params)
            .await;
        let rolled_back = self.rollback(&mut run, params).await?;
        self.steady_state(&run, params).await?;
        self.post_process(&mut run).await?;
        Ok(RollbackOutcome {
            rolled_back,
            recreation,
            recreated: run.resources_recreated.clone(),
        })
    }

    /// Resolves which history drives the rollback. The declarative format
    /// falls back to legacy data where a migration left the declarative
    /// history unusable.
    pub async fn init(&self, request: &RollbackRequest) -> Result<RollbackRun, RollbackError> {
        let release_number = request.release_number.filter(|n| *n > 0);
        let mut run = RollbackRun {
            release_name: request.release_name.clone(),
            mode: HistoryMode::Legacy,
            noop: false,
            history: ReleaseHistory::new(),
            current_number: release_number,
            current_override: None,
            bound_override: None,
            resources_recreated: Vec::new(),
            previous_workload_ids: Vec::new(),
            previous_custom: Vec::new(),
        };

        if !request.use_declarative_rollback {
            run.history = self.legacy.release_history(&request.release_name).await?;
            if run.history.is_empty() {
                info!(release = %request.release_name, "no previous release found, skipping rollback");
                run.noop = true;
            }
            return Ok(run);
        }

        let declarative = self.declarative.release_history(&request.release_name).await?;
        if declarative.is_empty() {
            let legacy = self.legacy.release_history(&request.release_name).await?;
            if legacy.is_empty() {
                info!(release = %request.release_name, "no release data found, skipping rollback");
                run.noop = true;
                return Ok(run);
            }
            if release_number.is_some() {
                // The in-flight release predates the declarative switch.
                run.history = legacy;
                return Ok(run);
            }
            info!(
                release = %request.release_name,
                "declarative history is empty and no release number was supplied, skipping rollback"
            );
            run.noop = true;
            return Ok(run);
        }

        if declarative.last_successful().is_some() {
            run.mode = HistoryMode::Declarative;
            run.history = declarative;
            return Ok(run);
        }

        // No successful declarative release yet; the rollback target can only
        // live in the legacy history. The latest declarative release still
        // describes what the failed deployment created.
        let legacy = self.legacy.release_history(&request.release_name).await?;
        if legacy.is_empty() {
            run.mode = HistoryMode::Declarative;
            run.history = declarative;
            return Ok(run);
        }
        run.history = legacy;
        run.current_override = declarative.latest().map(convert_declarative_release);
        run.bound_override = Some(u64::MAX);
        Ok(run)
    }

    /// Re-applies pruned resources from the rollback target's stored
    /// manifests. Failures degrade to a status, never an error.
    pub async fn recreate_pruned_resources(
        &self,
        run: &mut RollbackRun,
        pruned: &[ResourceId],
        params: &TaskParams,
    ) -> ResourceRecreationStatus {
        if pruned.is_empty() {
            info!("no resources were pruned, nothing to recreate");
            return ResourceRecreationStatus::NoResourceCreated;
        }
        if run.noop || run.history.is_empty() {
            info!("no release history found, cannot recreate pruned resources");
            return ResourceRecreationStatus::NoResourceCreated;
        }
        let Some(target) = run.history.last_successful_before(self.search_bound(run)) else {
            info!("no previous successful release found, cannot recreate pruned resources");
            return ResourceRecreationStatus::NoResourceCreated;
        };

        let to_recreate: Vec<Resource> = target
            .resources
            .iter()
            .filter(|r| pruned.iter().any(|id| id.same_object(&r.id)))
            .cloned()
            .collect();
        if to_recreate.is_empty() {
            info!("pruned resources are not part of the rollback target, nothing to recreate");
            return ResourceRecreationStatus::NoResourceCreated;
        }

        match self.cluster.apply(&to_recreate, params).await {
            Ok(()) => {
                run.resources_recreated = to_recreate.iter().map(|r| r.id.clone()).collect();
                info!(count = run.resources_recreated.len(), "recreated pruned resources");
                ResourceRecreationStatus::CreationSuccessful
            }
            Err(error) => {
                warn!(error = %error, "failed to recreate pruned resources");
                ResourceRecreationStatus::CreationFailed
            }
        }
    }

    /// Best-effort deletion of resources the failed release created on top of
    /// the rollback target. Failures are logged and swallowed.
    pub async fn delete_new_resources_for_failed_release(
        &self,
        run: &RollbackRun,
        params: &TaskParams,
    ) {
        if run.noop || (run.current_number.is_none() && run.current_override.is_none()) {
            return;
        }
        let Some(current) = self.current_release(run) else {
            return;
        };
        if current.status == ReleaseStatus::Succeeded {
            return;
        }
        let Some(previous) = run.history.last_successful_before(self.search_bound(run)) else {
            return;
        };

        let new_ids: Vec<ResourceId> = current
            .resource_ids
            .iter()
            .filter(|id| !previous.resource_ids.iter().any(|p| p.same_object(id)))
            .filter(|id| !run.resources_recreated.iter().any(|r| r.same_object(id)))
            .cloned()
            .collect();
        if new_ids.is_empty() {
            return;
        }

        let ordered = deletion_order(&new_ids);
        match self
            .cluster
            .delete_handling_partial_execution(&ordered, params)
            .await
        {
            Ok(deleted) => {
                info!(count = deleted.len(), "deleted resources created by the failed release");
            }
            Err(error) => {
                warn!(error = %error, "failed to delete resources of the failed release, continuing");
            }
        }
    }

    /// Rolls the workloads back to the previous successful release. Returns
    /// `false` for every documented no-op.
    pub async fn rollback(
        &self,
        run: &mut RollbackRun,
        params: &TaskParams,
    ) -> Result<bool, RollbackError> {
        if run.noop {
            return Ok(false);
        }
        let Some(current) = self.current_release(run).cloned() else {
            info!("no failed release found, skipping rollback");
            return Ok(false);
        };
        if current.status == ReleaseStatus::Succeeded
            && run.current_number.is_none()
            && run.current_override.is_none()
        {
            info!("no failed release found, skipping rollback");
            return Ok(false);
        }

        let Some(previous) = run
            .history
            .last_successful_before(self.search_bound(run))
            .cloned()
        else {
            info!("no previous eligible release found, cannot roll back");
            return Ok(false);
        };
        info!(
            number = previous.number,
            status = ?previous.status,
            "previous eligible release found"
        );

        match run.mode {
            HistoryMode::Legacy => {
                if previous.managed_workloads.is_empty() && previous.custom_workloads.is_empty() {
                    info!("no managed workload found in previous eligible release, skipping rollback");
                    return Ok(false);
                }

                for entry in &previous.managed_workloads {
                    info!(
                        workload = %entry.workload,
                        revision = entry.revision.as_deref().unwrap_or("latest"),
                        "rolling back workload"
                    );
                    self.cluster
                        .rollout_undo(&entry.workload, entry.revision.as_deref(), params)
                        .await?;
                }

                self.rollback_custom_workloads(run, &current, &previous.custom_workloads, params)
                    .await?;

                run.previous_workload_ids = previous
                    .managed_workloads
                    .iter()
                    .map(|w| w.workload.clone())
                    .collect();
                run.previous_custom = previous.custom_workloads.clone();
            }
            HistoryMode::Declarative => {
                if previous.resources.is_empty() {
                    info!("previous eligible release has no stored manifests, skipping rollback");
                    return Ok(false);
                }
                self.cluster.apply(&previous.resources, params).await?;

                let (managed, custom) = partition_workloads(&previous.resources);
                run.previous_workload_ids = managed.iter().map(|r| r.id.clone()).collect();
                run.previous_custom = custom;
            }
        }
        Ok(true)
    }

    /// Custom workloads have no rollout history: the failed release's objects
    /// are deleted and the previous release's manifests re-applied.
    async fn rollback_custom_workloads(
        &self,
        run: &RollbackRun,
        current: &Release,
        previous_custom: &[Resource],
        params: &TaskParams,
    ) -> Result<(), RollbackError> {
        let current_custom: Vec<ResourceId> = current
            .custom_workloads
            .iter()
            .map(|r| r.id.clone())
            .filter(|id| !run.resources_recreated.iter().any(|r| r.same_object(id)))
            .collect();
        if !current_custom.is_empty() {
            let ordered = deletion_order(&current_custom);
            self.cluster
                .delete_handling_partial_execution(&ordered, params)
                .await?;
        }
        if !previous_custom.is_empty() {
            self.cluster.apply(previous_custom, params).await?;
        }
        Ok(())
    }

    pub async fn steady_state(
        &self,
        run: &RollbackRun,
        params: &TaskParams,
    ) -> Result<(), RollbackError> {
        if run.previous_workload_ids.is_empty() && run.previous_custom.is_empty() {
            info!("skipping status check, no previous eligible managed workload");
            return Ok(());
        }
        if !run.previous_workload_ids.is_empty()
            && !self
                .cluster
                .status_check(&run.previous_workload_ids, params)
                .await?
        {
            return Err(RollbackError::NotSteady);
        }
        if !run.previous_custom.is_empty()
            && !self
                .cluster
                .status_check_custom(&run.previous_custom, params)
                .await?
        {
            return Err(RollbackError::NotSteady);
        }
        Ok(())
    }

    /// Marks the rolled-back release `Failed` and persists once.
    pub async fn post_process(&self, run: &mut RollbackRun) -> Result<(), RollbackError> {
        if run.noop || run.current_override.is_some() {
            return Ok(());
        }
        let number = match run.current_number {
            Some(number) => Some(number),
            None => run.history.latest().map(|r| r.number),
        };
        let Some(number) = number else {
            return Ok(());
        };

        let mut changed = false;
        if let Some(release) = run.history.find_mut(number) {
            if release.status != ReleaseStatus::Succeeded {
                release.status = ReleaseStatus::Failed;
                changed = true;
            }
        }
        if changed {
            let handler = match run.mode {
                HistoryMode::Legacy => self.legacy,
                HistoryMode::Declarative => self.declarative,
            };
            handler.save(&run.release_name, &run.history).await?;
        }
        Ok(())
    }

    fn current_release<'r>(&self, run: &'r RollbackRun) -> Option<&'r Release> {
        if let Some(current) = &run.current_override {
            return Some(current);
        }
        match run.current_number {
            Some(number) => run.history.find(number),
            None => run.history.latest(),
        }
    }

    fn search_bound(&self, run: &RollbackRun) -> u64 {
        run.bound_override
            .unwrap_or_else(|| run.current_number.unwrap_or(u64::MAX))
    }
}

/// Reshapes a declarative release so the legacy path can delete what it
/// created: workloads are re-derived from its stored manifests.
fn convert_declarative_release(release: &Release) -> Release {
    let (managed, custom) = partition_workloads(&release.resources);
    let mut converted = release.clone();
    converted.managed_workloads = managed
        .iter()
        .map(|w| WorkloadRevision {
            workload: w.id.clone(),
            revision: None,
        })
        .collect();
    converted.custom_workloads = custom;
    converted
}

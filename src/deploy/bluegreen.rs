// ABOUTME: Blue/green deployment controller and the post-swap stage scale-down.
// ABOUTME: Resolves primary/stage services, colors the workload, sweeps old stage releases.

use super::error::DeployError;
use crate::manifest::{
    self, deletion_order, is_eligible_workload, parse_manifests, set_default_namespace, Resource,
    ResourceId,
};
use crate::ports::{ClusterOps, PodInfo, TaskParams};
use crate::release::{Release, ReleaseHandler, ReleaseHistory, ReleaseStatus, WorkloadRevision};
use crate::types::{labels, Color, ReleaseName};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STRATEGY: &str = "blue/green";

/// Kinds eligible for the post-swap stage scale-down.
const SCALE_DOWN_KINDS: [&str; 5] = [
    "Deployment",
    "StatefulSet",
    "DeploymentConfig",
    "HorizontalPodAutoscaler",
    "PodDisruptionBudget",
];

#[derive(Debug, Clone)]
pub struct BlueGreenRequest {
    pub release_name: ReleaseName,
    pub manifests: Vec<String>,
    pub skip_dry_run: bool,
    pub skip_versioning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueGreenOutcome {
    pub release_number: u64,
    pub primary_service: String,
    pub stage_service: String,
    pub primary_color: Color,
    pub stage_color: Color,
    pub workload: ResourceId,
    pub pods: Vec<PodInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageScaleDownOutcome {
    pub color: Option<Color>,
    pub scaled: Vec<ResourceId>,
    pub deleted: Vec<ResourceId>,
}

pub struct BlueGreenDeploy<'a> {
    cluster: &'a dyn ClusterOps,
    releases: &'a dyn ReleaseHandler,
}

struct BlueGreenRun {
    params: TaskParams,
    release_name: ReleaseName,
    resources: Vec<Resource>,
    workload_id: ResourceId,
    primary_service: String,
    stage_service: String,
    primary_color: Color,
    stage_color: Color,
    history: ReleaseHistory,
    release_number: u64,
    existing_pods: Vec<PodInfo>,
}

impl<'a> BlueGreenDeploy<'a> {
    pub fn new(cluster: &'a dyn ClusterOps, releases: &'a dyn ReleaseHandler) -> Self {
        Self { cluster, releases }
    }

    pub async fn run(
        &self,
        request: BlueGreenRequest,
        params: &TaskParams,
    ) -> Result<BlueGreenOutcome, DeployError> {
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
        request: &BlueGreenRequest,
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
        request: BlueGreenRequest,
        params: &TaskParams,
        resources: Vec<Resource>,
    ) -> Result<BlueGreenRun, DeployError> {
        let mut history = self.releases.release_history(&request.release_name).await?;
        let release_number = history.next_release_number();

        let mut resources = manifest::version_resources(
            &resources,
            release_number,
            request.skip_versioning,
        );
        resources = manifest::stamp_release_labels(&resources, &request.release_name, release_number);

        let (primary_index, stage_index) = resolve_services(&mut resources)?;

        let primary_name = resources[primary_index].name().to_string();
        let stage_name = resources[stage_index].name().to_string();

        let primary_color = self
            .primary_color(&params.namespace, &primary_name)
            .await?;
        let stage_color = primary_color.inverse();

        // Color the single eligible workload for the stage side.
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
        resources[workload_index] = manifest::color_workload(&resources[workload_index], stage_color);
        let workload_id = resources[workload_index].id.clone();

        resources[primary_index] =
            manifest::color_service(&resources[primary_index], primary_color);
        resources[stage_index] = manifest::color_service(&resources[stage_index], stage_color);

        self.cleanup_old_stage_releases(&mut history, stage_color, params)
            .await;

        let mut release = self.releases.create_release(&history);
        // The cleanup may have shrunk the history; keep the number already
        // stamped into the manifests.
        release.number = release_number;
        release.resource_ids = resources.iter().map(|r| r.id.clone()).collect();
        release.managed_workloads = vec![WorkloadRevision {
            workload: workload_id.clone(),
            revision: None,
        }];
        release.resources = resources.clone();
        release.color = Some(stage_color);
        history.add(release)?;

        let existing_pods = self
            .cluster
            .pods_with_color(
                &params.namespace,
                request.release_name.as_str(),
                stage_color,
                params.timeout,
            )
            .await?;

        info!(
            release = %request.release_name,
            number = release_number,
            primary = %primary_color,
            stage = %stage_color,
            "prepared blue/green release"
        );

        Ok(BlueGreenRun {
            params: params.clone(),
            release_name: request.release_name,
            resources,
            workload_id,
            primary_service: primary_name,
            stage_service: stage_name,
            primary_color,
            stage_color,
            history,
            release_number,
            existing_pods,
        })
    }

    /// Primary color comes from the live primary service's selector; a live
    /// service without the color label conflicts with blue/green, an absent
    /// service gets the default.
    async fn primary_color(&self, namespace: &str, name: &str) -> Result<Color, DeployError> {
        match self.cluster.service(namespace, name).await? {
            None => Ok(Color::DEFAULT),
            Some(live) => match live.color_selector() {
                Some(color) => Ok(color.parse()?),
                None => Err(DeployError::ConflictingService {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Sweeps earlier releases deployed to the stage color: their versioned
    /// resources are deleted and the releases drop out of history.
    async fn cleanup_old_stage_releases(
        &self,
        history: &mut ReleaseHistory,
        stage_color: Color,
        params: &TaskParams,
    ) {
        let suffix = stage_color.suffix();
        let stale: Vec<u64> = history
            .releases()
            .iter()
            .filter(|release| {
                release.color == Some(stage_color)
                    || release
                        .managed_workloads
                        .iter()
                        .any(|w| w.workload.name.ends_with(&suffix))
            })
            .map(|release| release.number)
            .collect();

        for number in stale {
            let versioned = history
                .find(number)
                .map(Release::versioned_resource_ids)
                .unwrap_or_default();
            if !versioned.is_empty() {
                let ordered = deletion_order(&versioned);
                if let Err(error) = self.cluster.delete(&ordered, params).await {
                    warn!(number, error = %error, "failed to delete versioned resources of stale stage release");
                }
            }
            info!(number, color = %stage_color, "removing stale stage release");
            history.remove(number);
        }
    }

    async fn apply(&self, run: &BlueGreenRun) -> Result<(), DeployError> {
        self.cluster
            .apply(&run.resources, &run.params)
            .await
            .map_err(DeployError::Apply)
    }

    async fn steady_state(&self, run: &mut BlueGreenRun) -> Result<(), DeployError> {
        let workloads = vec![run.workload_id.clone()];
        let result = match self.cluster.status_check(&workloads, &run.params).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeployError::NotSteady),
            Err(error) => Err(DeployError::Cluster(error)),
        };

        match self
            .cluster
            .latest_revision(&run.workload_id, &run.params)
            .await
        {
            Ok(revision) => {
                if let Some(release) = run.history.find_mut(run.release_number) {
                    release.set_revision(&run.workload_id, revision);
                }
            }
            Err(error) => {
                warn!(workload = %run.workload_id, error = %error, "failed to read rollout revision");
            }
        }
        result
    }

    async fn wrap_up(&self, run: &mut BlueGreenRun) -> Result<BlueGreenOutcome, DeployError> {
        let mut pods = match self
            .cluster
            .pods_with_color(
                &run.params.namespace,
                run.release_name.as_str(),
                run.stage_color,
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
        }
        self.releases.save(&run.release_name, &run.history).await?;
        info!(
            release = %run.release_name,
            number = run.release_number,
            stage = %run.stage_color,
            "blue/green release succeeded"
        );

        Ok(BlueGreenOutcome {
            release_number: run.release_number,
            primary_service: run.primary_service.clone(),
            stage_service: run.stage_service.clone(),
            primary_color: run.primary_color,
            stage_color: run.stage_color,
            workload: run.workload_id.clone(),
            pods,
        })
    }

    async fn persist_failed(&self, run: &mut BlueGreenRun) {
        if let Some(release) = run.history.find_mut(run.release_number) {
            release.status = ReleaseStatus::Failed;
        }
        if let Err(error) = self.releases.save(&run.release_name, &run.history).await {
            warn!(release = %run.release_name, error = %error, "failed to persist failed release");
        }
    }

    /// Scales down the environment left without traffic after a selector
    /// swap. HPAs and PDBs are deleted, workloads are scaled to zero. A no-op
    /// when no swap has happened yet.
    pub async fn scale_down_stage(
        &self,
        release_name: &ReleaseName,
        primary_service: &str,
        params: &TaskParams,
    ) -> Result<StageScaleDownOutcome, DeployError> {
        let history = self.releases.release_history(release_name).await?;
        let Some(last) = history
            .releases()
            .iter()
            .rev()
            .find(|r| r.status == ReleaseStatus::Succeeded && r.color.is_some())
        else {
            info!("no successful blue/green release found, skipping stage scale down");
            return Ok(StageScaleDownOutcome {
                color: None,
                scaled: Vec::new(),
                deleted: Vec::new(),
            });
        };
        let deployed_color = match last.color {
            Some(color) => color,
            None => {
                return Ok(StageScaleDownOutcome {
                    color: None,
                    scaled: Vec::new(),
                    deleted: Vec::new(),
                })
            }
        };

        let live_primary = self
            .cluster
            .service(&params.namespace, primary_service)
            .await?
            .ok_or_else(|| DeployError::ServiceNotFound {
                name: primary_service.to_string(),
                namespace: params.namespace.clone(),
            })?;
        let primary_color: Color = match live_primary.color_selector() {
            Some(color) => color.parse()?,
            None => {
                return Err(DeployError::ConflictingService {
                    name: primary_service.to_string(),
                })
            }
        };

        // The last release deployed to its recorded color; traffic moved
        // there only if the primary now selects it.
        if primary_color != deployed_color {
            info!(
                deployed = %deployed_color,
                primary = %primary_color,
                "no swap detected, skipping stage scale down"
            );
            return Ok(StageScaleDownOutcome {
                color: None,
                scaled: Vec::new(),
                deleted: Vec::new(),
            });
        }

        let stage_color = primary_color.inverse();
        let suffix = stage_color.suffix();
        let mut candidates: Vec<ResourceId> = Vec::new();
        for release in history.releases().iter().rev() {
            for id in &release.resource_ids {
                if SCALE_DOWN_KINDS.contains(&id.kind.as_str())
                    && id.name.ends_with(&suffix)
                    && !candidates.iter().any(|c| c.same_object(id))
                {
                    candidates.push(id.clone());
                }
            }
        }

        let mut scaled = Vec::new();
        let mut deleted = Vec::new();
        for id in candidates {
            if self.cluster.is_direct_apply(&id, params).await? {
                continue;
            }
            if matches!(
                id.kind.as_str(),
                "HorizontalPodAutoscaler" | "PodDisruptionBudget"
            ) {
                self.cluster.delete(&[id.clone()], params).await?;
                deleted.push(id);
            } else {
                self.cluster.scale(&id, 0, params).await?;
                scaled.push(id);
            }
        }

        info!(
            color = %stage_color,
            scaled = scaled.len(),
            deleted = deleted.len(),
            "scaled down stage environment"
        );
        Ok(StageScaleDownOutcome {
            color: Some(stage_color),
            scaled,
            deleted,
        })
    }
}

/// Finds the primary and stage services, appending a generated `-stage` clone
/// when the manifests only ship a primary. Returns their indices.
fn resolve_services(resources: &mut Vec<Resource>) -> Result<(usize, usize), DeployError> {
    let service_indices: Vec<usize> = resources
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind() == "Service")
        .map(|(i, _)| i)
        .collect();

    let annotated_primary = service_indices
        .iter()
        .copied()
        .find(|i| resources[*i].annotation_flag(labels::PRIMARY_SERVICE));
    let annotated_stage = service_indices
        .iter()
        .copied()
        .find(|i| resources[*i].annotation_flag(labels::STAGE_SERVICE));

    let primary = match annotated_primary {
        Some(index) => index,
        None => match service_indices.len() {
            0 => return Err(DeployError::NoServiceFound),
            1 => service_indices[0],
            count => return Err(DeployError::AmbiguousPrimaryService { count }),
        },
    };

    let stage = match annotated_stage {
        Some(index) => index,
        None => {
            let stage_service = manifest::stage_service_from_primary(&resources[primary]);
            resources.push(stage_service);
            resources.len() - 1
        }
    };

    Ok((primary, stage))
}

// ABOUTME: Swaps the pod selectors of the primary and stage services.
// ABOUTME: Routes traffic to the freshly verified stage environment in one step.

use super::error::DeployError;
use crate::ports::{ClusterOps, ServiceInfo, TaskParams};
use crate::types::Color;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub primary_service: String,
    pub stage_service: String,
    /// Color the primary selects after the swap.
    pub primary_color: Color,
    pub stage_color: Color,
}

pub struct SwapServiceSelectors<'a> {
    cluster: &'a dyn ClusterOps,
}

impl<'a> SwapServiceSelectors<'a> {
    pub fn new(cluster: &'a dyn ClusterOps) -> Self {
        Self { cluster }
    }

    pub async fn run(
        &self,
        primary_service: &str,
        stage_service: &str,
        params: &TaskParams,
    ) -> Result<SwapOutcome, DeployError> {
        let primary = self.fetch(primary_service, params).await?;
        let stage = self.fetch(stage_service, params).await?;

        // Validate colors before touching anything so a failed parse cannot
        // leave the services half swapped.
        let new_primary_color: Color = color_of(&primary.name, &stage)?;
        let new_stage_color: Color = color_of(&stage.name, &primary)?;

        self.cluster
            .patch_service_selector(&params.namespace, &primary.name, &stage.selector)
            .await?;
        self.cluster
            .patch_service_selector(&params.namespace, &stage.name, &primary.selector)
            .await?;

        info!(
            primary = %primary.name,
            stage = %stage.name,
            color = %new_primary_color,
            "swapped service selectors"
        );

        Ok(SwapOutcome {
            primary_service: primary.name,
            stage_service: stage.name,
            primary_color: new_primary_color,
            stage_color: new_stage_color,
        })
    }

    async fn fetch(&self, name: &str, params: &TaskParams) -> Result<ServiceInfo, DeployError> {
        self.cluster
            .service(&params.namespace, name)
            .await?
            .ok_or_else(|| DeployError::ServiceNotFound {
                name: name.to_string(),
                namespace: params.namespace.clone(),
            })
    }
}

fn color_of(owner: &str, donor: &ServiceInfo) -> Result<Color, DeployError> {
    match donor.color_selector() {
        Some(color) => Ok(color.parse()?),
        None => Err(DeployError::ConflictingService {
            name: owner.to_string(),
        }),
    }
}

// ABOUTME: Strategy controllers: rolling, blue/green, canary, scale, delete, selector swap.
// ABOUTME: Each threads an explicit run context through Init, Prepare, Apply, SteadyState, WrapUp, Persist.

mod bluegreen;
mod canary;
mod delete;
mod error;
mod response;
mod rolling;
mod scale;
mod swap;

pub use bluegreen::{BlueGreenDeploy, BlueGreenOutcome, BlueGreenRequest, StageScaleDownOutcome};
pub use canary::{
    target_instances, CanaryDelete, CanaryDeploy, CanaryInstances, CanaryOutcome, CanaryRequest,
};
pub use delete::{DeleteOutcome, DeleteRequest, DeleteResources};
pub use error::DeployError;
pub use response::{DeployResponse, DeployStatus};
pub use rolling::{RollingDeploy, RollingOutcome, RollingRequest};
pub use scale::{ScaleOutcome, ScaleRequest, ScaleTarget, ScaleWorkload};
pub use swap::{SwapOutcome, SwapServiceSelectors};

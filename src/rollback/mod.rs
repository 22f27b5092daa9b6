// ABOUTME: Rollback engine and the pruning computation shared with rolling deploys.
// ABOUTME: Handles legacy revision-undo and declarative whole-manifest rollback paths.

mod engine;
mod prune;

pub use engine::{
    Rollback, RollbackError, RollbackOutcome, RollbackRequest, RollbackRun,
};
pub use prune::{prunable_resources, ResourceRecreationStatus};

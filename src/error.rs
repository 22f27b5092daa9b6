// ABOUTME: Crate-level error type aggregating the per-module error enums.
// ABOUTME: Callers embedding the engine match on this at their outermost seam.

use crate::deploy::DeployError;
use crate::manifest::ManifestError;
use crate::release::ReleaseError;
use crate::rollback::RollbackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

pub type Result<T> = std::result::Result<T, Error>;

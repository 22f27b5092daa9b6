// ABOUTME: Backing-store traits for persisted release history.
// ABOUTME: Legacy keeps one YAML blob per release name; declarative keeps one object per release.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("release store backend error: {0}")]
    Backend(String),

    #[error("release store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store for the legacy format: the entire history serialized into a single
/// ConfigMap/Secret keyed by release name.
#[async_trait]
pub trait LegacyReleaseStore: Send + Sync {
    /// Returns the stored blob, or `None` when no history exists yet.
    async fn read(&self, release_name: &str) -> Result<Option<String>, StoreError>;

    async fn write(&self, release_name: &str, blob: &str) -> Result<(), StoreError>;
}

/// Store for the declarative format: one object per release, independently
/// writable and removable. Implementations key objects as
/// `release.<name>.<number>`, which `ReleaseName` budgets for.
#[async_trait]
pub trait ReleaseObjectStore: Send + Sync {
    /// All stored release payloads for a release name, in no particular order.
    async fn list(&self, release_name: &str) -> Result<Vec<String>, StoreError>;

    async fn put(&self, release_name: &str, number: u64, payload: &str) -> Result<(), StoreError>;

    async fn remove(&self, release_name: &str, number: u64) -> Result<(), StoreError>;
}

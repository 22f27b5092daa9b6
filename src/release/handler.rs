// ABOUTME: The ReleaseHandler contract plus its legacy and declarative implementations.
// ABOUTME: Absent history reads as empty; malformed history is always a hard error.

use super::history::{HistoryError, ReleaseHistory};
use super::release::Release;
use crate::ports::{LegacyReleaseStore, ReleaseObjectStore, StoreError};
use crate::types::ReleaseName;
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("release history for '{name}' is corrupt: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Persistence contract shared by both history formats. Only the rollback
/// engine ever holds two handlers at once (declarative with legacy fallback).
#[async_trait]
pub trait ReleaseHandler: Send + Sync {
    /// The stored history; empty when none exists yet, never "null".
    async fn release_history(&self, name: &ReleaseName) -> Result<ReleaseHistory, ReleaseError>;

    /// Persists the whole history, releases no longer present are removed.
    async fn save(&self, name: &ReleaseName, history: &ReleaseHistory)
        -> Result<(), ReleaseError>;

    /// Next release for this history, numbered one past the latest.
    fn create_release(&self, history: &ReleaseHistory) -> Release {
        Release::new(history.next_release_number())
    }
}

/// Legacy format: the whole history as one YAML blob.
pub struct LegacyReleaseHandler<S> {
    store: S,
}

impl<S: LegacyReleaseStore> LegacyReleaseHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: LegacyReleaseStore> ReleaseHandler for LegacyReleaseHandler<S> {
    async fn release_history(&self, name: &ReleaseName) -> Result<ReleaseHistory, ReleaseError> {
        match self.store.read(name.as_str()).await? {
            None => Ok(ReleaseHistory::new()),
            Some(blob) if blob.trim().is_empty() => Ok(ReleaseHistory::new()),
            Some(blob) => serde_yaml::from_str(&blob).map_err(|source| ReleaseError::Corrupt {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn save(&self, name: &ReleaseName, history: &ReleaseHistory) -> Result<(), ReleaseError> {
        let blob = serde_yaml::to_string(history).map_err(|source| ReleaseError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        self.store.write(name.as_str(), &blob).await?;
        Ok(())
    }
}

/// Declarative format: one stored object per release.
pub struct DeclarativeReleaseHandler<S> {
    store: S,
}

impl<S: ReleaseObjectStore> DeclarativeReleaseHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn stored_numbers(&self, name: &ReleaseName) -> Result<BTreeSet<u64>, ReleaseError> {
        let mut numbers = BTreeSet::new();
        for payload in self.store.list(name.as_str()).await? {
            let release: Release =
                serde_yaml::from_str(&payload).map_err(|source| ReleaseError::Corrupt {
                    name: name.to_string(),
                    source,
                })?;
            numbers.insert(release.number);
        }
        Ok(numbers)
    }
}

#[async_trait]
impl<S: ReleaseObjectStore> ReleaseHandler for DeclarativeReleaseHandler<S> {
    async fn release_history(&self, name: &ReleaseName) -> Result<ReleaseHistory, ReleaseError> {
        let mut releases = Vec::new();
        for payload in self.store.list(name.as_str()).await? {
            let release: Release =
                serde_yaml::from_str(&payload).map_err(|source| ReleaseError::Corrupt {
                    name: name.to_string(),
                    source,
                })?;
            releases.push(release);
        }
        releases.sort_by_key(|r| r.number);

        let mut history = ReleaseHistory::new();
        for release in releases {
            history.add(release)?;
        }
        Ok(history)
    }

    async fn save(&self, name: &ReleaseName, history: &ReleaseHistory) -> Result<(), ReleaseError> {
        let mut kept = BTreeSet::new();
        for release in history.releases() {
            let payload =
                serde_yaml::to_string(release).map_err(|source| ReleaseError::Corrupt {
                    name: name.to_string(),
                    source,
                })?;
            self.store
                .put(name.as_str(), release.number, &payload)
                .await?;
            kept.insert(release.number);
        }

        for stale in self.stored_numbers(name).await?.difference(&kept) {
            debug!(release = %name, number = stale, "removing stale release object");
            self.store.remove(name.as_str(), *stale).await?;
        }
        Ok(())
    }
}

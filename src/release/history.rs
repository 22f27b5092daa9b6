// ABOUTME: Ordered release history for one (release name, namespace) pair.
// ABOUTME: Numbers are strictly increasing; rollback targets must be Succeeded.

use super::release::{Release, ReleaseStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("release number {number} is not greater than the latest release {latest}")]
    NonMonotonic { number: u64, latest: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseHistory {
    #[serde(default)]
    releases: Vec<Release>,
}

impl ReleaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn latest(&self) -> Option<&Release> {
        self.releases.last()
    }

    pub fn latest_mut(&mut self) -> Option<&mut Release> {
        self.releases.last_mut()
    }

    pub fn next_release_number(&self) -> u64 {
        self.latest().map_or(1, |r| r.number + 1)
    }

    pub fn find(&self, number: u64) -> Option<&Release> {
        self.releases.iter().find(|r| r.number == number)
    }

    pub fn find_mut(&mut self, number: u64) -> Option<&mut Release> {
        self.releases.iter_mut().find(|r| r.number == number)
    }

    /// Most recent `Succeeded` release strictly before `bound`. This is the
    /// rollback target; `u64::MAX` bounds the search for an aborted
    /// in-progress deployment.
    pub fn last_successful_before(&self, bound: u64) -> Option<&Release> {
        self.releases
            .iter()
            .rev()
            .find(|r| r.number < bound && r.status == ReleaseStatus::Succeeded)
    }

    /// Most recent `Succeeded` release, no bound.
    pub fn last_successful(&self) -> Option<&Release> {
        self.last_successful_before(u64::MAX)
    }

    pub fn add(&mut self, release: Release) -> Result<(), HistoryError> {
        if let Some(latest) = self.latest() {
            if release.number <= latest.number {
                return Err(HistoryError::NonMonotonic {
                    number: release.number,
                    latest: latest.number,
                });
            }
        }
        self.releases.push(release);
        Ok(())
    }

    pub fn remove(&mut self, number: u64) {
        self.releases.retain(|r| r.number != number);
    }
}

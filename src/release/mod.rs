// ABOUTME: Release data model, history, and the persistence handler contract.
// ABOUTME: Legacy aggregate-blob and declarative per-release formats share one trait.

mod handler;
mod history;
mod release;

pub use handler::{DeclarativeReleaseHandler, LegacyReleaseHandler, ReleaseError, ReleaseHandler};
pub use history::{HistoryError, ReleaseHistory};
pub use release::{Release, ReleaseStatus, WorkloadRevision};

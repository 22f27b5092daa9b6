// ABOUTME: Kubernetes release orchestration engine.
// ABOUTME: Rolling, blue/green and canary strategies over a persisted release history.

pub mod deploy;
pub mod error;
pub mod manifest;
pub mod ports;
pub mod release;
pub mod rollback;
pub mod types;

pub use error::{Error, Result};

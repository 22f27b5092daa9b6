// ABOUTME: Validated domain types and label vocabulary for release orchestration.
// ABOUTME: Release names, blue/green colors, canary tracks, pidalio.io label keys.

mod color;
mod release_name;
mod track;

pub mod labels;

pub use color::{Color, ColorError};
pub use release_name::{ReleaseName, ReleaseNameError, MAX_RELEASE_NAME_LEN};
pub use track::Track;

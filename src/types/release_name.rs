// ABOUTME: Validated release name, the key all release state is filed under.
// ABOUTME: Names become label values and store keys, so the length budget reserves suffix room.

use std::fmt;
use thiserror::Error;

/// Release store keys are built as `release.<name>.<number>` and must still
/// fit a DNS-1123 label, so the name budget is 63 minus the prefix and a
/// five-digit release-number suffix.
const STORE_KEY_PREFIX: &str = "release.";
const NUMBER_SUFFIX_BUDGET: usize = 5;
pub const MAX_RELEASE_NAME_LEN: usize = 63 - STORE_KEY_PREFIX.len() - NUMBER_SUFFIX_BUDGET;

#[derive(Debug, Error)]
pub enum ReleaseNameError {
    #[error("release name cannot be empty")]
    Empty,

    #[error(
        "release name is {0} characters; at most {MAX_RELEASE_NAME_LEN} leave room \
         for the release store key"
    )]
    TooLong(usize),

    #[error("release name cannot begin or end with a hyphen")]
    HyphenAtEdge,

    #[error("release name may only contain lowercase alphanumerics and hyphens, found {0:?}")]
    ForbiddenChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseName(String);

impl ReleaseName {
    pub fn new(value: &str) -> Result<Self, ReleaseNameError> {
        if value.is_empty() {
            return Err(ReleaseNameError::Empty);
        }
        if value.len() > MAX_RELEASE_NAME_LEN {
            return Err(ReleaseNameError::TooLong(value.len()));
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(ReleaseNameError::HyphenAtEdge);
        }
        if let Some(offending) = value
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '-'))
        {
            return Err(ReleaseNameError::ForbiddenChar(offending));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

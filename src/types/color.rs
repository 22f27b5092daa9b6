// ABOUTME: Blue/green deployment colors.
// ABOUTME: The primary service selects one color; the stage always gets the inverse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown color '{0}', expected 'blue' or 'green'")]
pub struct ColorError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
}

impl Color {
    /// Color assumed for the primary side when no live service carries a
    /// color selector yet.
    pub const DEFAULT: Color = Color::Green;

    pub fn inverse(self) -> Color {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }

    /// Name suffix appended to stage workloads, e.g. `-blue`.
    pub fn suffix(self) -> String {
        format!("-{}", self.as_str())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Color::Blue),
            "green" => Ok(Color::Green),
            other => Err(ColorError(other.to_string())),
        }
    }
}

// ABOUTME: The outermost response envelope handed back to the task layer.
// ABOUTME: Maps controller results to success/failure plus a user-facing message.

use super::error::DeployError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse<T> {
    pub status: DeployStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<T>,
}

impl<T> DeployResponse<T> {
    pub fn success(outcome: T) -> Self {
        Self {
            status: DeployStatus::Success,
            message: None,
            outcome: Some(outcome),
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            status: DeployStatus::Failure,
            message: Some(message),
            outcome: None,
        }
    }

    /// Raw port output stays in logs; responses carry the display message only.
    pub fn from_result(result: Result<T, DeployError>) -> Self {
        match result {
            Ok(outcome) => Self::success(outcome),
            Err(error) => Self::failure(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_map_to_status_and_message() {
        let ok: DeployResponse<u64> = DeployResponse::from_result(Ok(7));
        assert_eq!(ok.status, DeployStatus::Success);
        assert_eq!(ok.outcome, Some(7));
        assert!(ok.message.is_none());

        let err: DeployResponse<u64> =
            DeployResponse::from_result(Err(DeployError::NoServiceFound));
        assert_eq!(err.status, DeployStatus::Failure);
        assert!(err.outcome.is_none());
        assert!(err.message.as_deref().is_some_and(|m| m.contains("service")));
    }
}

//! Sandbox errors and the error document printed on failure

use crate::supervisor::SupervisorState;
use serde::{Deserialize, Serialize};
use stratus_core::ErrorCode;
use thiserror::Error;

/// A failed supervisor step; every variant carries the last state reached
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Invalid invocation event: {0}")]
    InvalidEvent(String),

    #[error("Environment setup failed: {message}")]
    Environment {
        state: SupervisorState,
        message: String,
    },

    #[error("Container provisioning failed: {message}")]
    Provisioning {
        state: SupervisorState,
        message: String,
    },

    #[error("Script execution failed: {message}")]
    Execution {
        state: SupervisorState,
        message: String,
    },
}

impl SandboxError {
    /// Last state the supervisor reached before failing
    pub fn state(&self) -> SupervisorState {
        match self {
            Self::InvalidEvent(_) => SupervisorState::Idle,
            Self::Environment { state, .. }
            | Self::Provisioning { state, .. }
            | Self::Execution { state, .. } => *state,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEvent(_) => ErrorCode::ConfigError,
            Self::Environment { .. } => ErrorCode::InternalError,
            Self::Provisioning { .. } => ErrorCode::ProvisioningError,
            Self::Execution { .. } => ErrorCode::ExecutionError,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidEvent(_) => "Sandbox.InvalidEvent",
            Self::Environment { .. } => "Sandbox.EnvironmentError",
            Self::Provisioning { .. } => "Sandbox.ProvisioningError",
            Self::Execution { .. } => "Sandbox.ExecutionError",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error_message: self.to_string(),
            error_type: self.error_type().to_string(),
            state: self.state().as_str().to_string(),
        }
    }
}

/// Function error document, in the shape serverless runtimes report errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_message: String,
    pub error_type: String,
    pub state: String,
}

impl ErrorResponse {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let error = SandboxError::Provisioning {
            state: SupervisorState::EnvironmentPrepared,
            message: "pull alpine exited with status 1".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&error.to_response().to_json()).unwrap();
        assert_eq!(json["errorType"], "Sandbox.ProvisioningError");
        assert_eq!(json["state"], "EnvironmentPrepared");
        assert!(json["errorMessage"]
            .as_str()
            .unwrap()
            .contains("exited with status 1"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            SandboxError::InvalidEvent("x".into()).code(),
            ErrorCode::ConfigError
        );
        assert_eq!(
            SandboxError::InvalidEvent("x".into()).state(),
            SupervisorState::Idle
        );
        let error = SandboxError::Execution {
            state: SupervisorState::ScriptExecuted,
            message: "no output".into(),
        };
        assert_eq!(error.code(), ErrorCode::ExecutionError);
        assert!(error.code().is_fatal());
    }
}

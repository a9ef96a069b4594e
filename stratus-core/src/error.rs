//! Error taxonomy and formatting

use serde::Serialize;
use thiserror::Error;

/// Error categories shared by every Stratus command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Input
    ConfigError,

    // Resource lookups
    NotFound,
    AlreadyExists,

    // Cloud side
    ProvisioningError,
    InvocationError,

    // Sandbox side
    ExecutionError,

    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "ConfigError",
            Self::NotFound => "NotFoundError",
            Self::AlreadyExists => "AlreadyExistsError",
            Self::ProvisioningError => "ProvisioningError",
            Self::InvocationError => "InvocationError",
            Self::ExecutionError => "ExecutionError",
            Self::InternalError => "InternalError",
        }
    }

    /// Process exit code for this category.
    ///
    /// Missing and already existing resources are reportable outcomes,
    /// not process failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound | Self::AlreadyExists => 0,
            Self::ConfigError => 2,
            Self::ProvisioningError => 3,
            Self::InvocationError | Self::ExecutionError => 4,
            Self::InternalError => 1,
        }
    }

    /// Whether the outcome should be treated as a failure of the process
    pub fn is_fatal(&self) -> bool {
        self.exit_code() != 0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized error ready to be reported to the user
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct StratusError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
}

impl StratusError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Format as a JSON error document
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct JsonError<'a> {
            error_type: &'static str,
            error_message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            resource: Option<&'a str>,
        }

        let error = JsonError {
            error_type: self.code.as_str(),
            error_message: &self.message,
            resource: self.resource.as_deref(),
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(
                r#"{{"errorType":"{}","errorMessage":"{}"}}"#,
                self.code.as_str(),
                self.message
            )
        })
    }
}

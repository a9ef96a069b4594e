//! Provider and dispatch errors

use crate::contract::ResourceHandle;
use stratus_config::ConfigError;
use stratus_core::ErrorCode;
use thiserror::Error;

/// Errors returned by a cloud client
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Function execution failed: {0}")]
    Execution(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Outcomes of a provider command other than success
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Function not found: {0}")]
    NotFound(String),

    #[error("Function already exists: {0}")]
    AlreadyExists(String),

    /// Creation stopped part way; `partial` lists what does exist
    #[error("Provisioning failed: {message}")]
    Provisioning {
        message: String,
        partial: Box<ResourceHandle>,
    },

    #[error("Invocation failed: {0}")]
    Invocation(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::Provisioning { .. } => ErrorCode::ProvisioningError,
            Self::Invocation(_) => ErrorCode::InvocationError,
            Self::Cloud(CloudError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Cloud(CloudError::AlreadyExists { .. }) => ErrorCode::AlreadyExists,
            Self::Cloud(CloudError::Execution(_)) => ErrorCode::ExecutionError,
            Self::Cloud(_) => ErrorCode::ProvisioningError,
        }
    }

    /// Name of the resource the error is about, if there is one
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::NotFound(name) | Self::AlreadyExists(name) => Some(name),
            Self::Provisioning { partial, .. } => Some(&partial.function_name),
            Self::Cloud(CloudError::NotFound { name, .. })
            | Self::Cloud(CloudError::AlreadyExists { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Handle of resources left behind by a failed `init`
    pub fn partial_handle(&self) -> Option<&ResourceHandle> {
        match self {
            Self::Provisioning { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Errors surfaced by [`crate::Dispatcher`]
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Provider(e) => e.code(),
        }
    }
}

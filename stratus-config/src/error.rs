//! Configuration errors

use thiserror::Error;

/// A configuration that cannot drive the requested command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field {field} should be a {expected}, found {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invariant { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invariant(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invariant {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field)
            | Self::TypeMismatch { field, .. }
            | Self::Invariant { field, .. } => field,
        }
    }
}

//! Request ID generation

use uuid::Uuid;

/// Identifier attached to a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId {
    /// Hyphenated UUID, as reported to the caller
    pub id: String,
}

impl RequestId {
    /// Generate a new request ID
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Short prefix used to name log streams
    pub fn short(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }

    /// Log stream name for an invocation started on `date` (`YYYY/MM/DD`)
    pub fn log_stream_name(&self, date: &str) -> String {
        format!("{}/[$LATEST]{}", date, self.short())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

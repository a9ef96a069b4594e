//! The command set every provider backend implements

use crate::error::ProviderError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use stratus_config::ResourceConfig;

/// Identifiers of the resources provisioned for one deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceHandle {
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// Set when the role was created for this deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_environment: Option<String>,
    /// `bucket[/folder]` whose new objects invoke the function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

impl ResourceHandle {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            ..Default::default()
        }
    }

    /// Whether anything at all was created
    pub fn is_empty(&self) -> bool {
        self.function_arn.is_none()
            && self.managed_role.is_none()
            && self.log_group.is_none()
            && self.batch_environment.is_none()
            && self.trigger.is_none()
            && self.api_id.is_none()
    }
}

/// Result metadata of a `run`
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub function_name: String,
    pub request_id: String,
    pub status_code: u16,
    pub log_group: String,
    pub log_stream: String,
    /// Function output; synchronous invocations only
    pub output: Option<Bytes>,
    pub function_error: Option<String>,
}

/// One row of `ls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub name: String,
    pub arn: String,
    pub image: String,
    pub memory: u32,
    pub timeout: u32,
    pub runtime: String,
    pub execution_target: String,
    pub code_sha256: String,
    pub last_modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
}

/// What `rm` acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmTarget {
    /// The function named in the configuration
    Named,
    /// Every function managed by stratus
    All,
}

/// A resource removed by `rm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedResource {
    pub kind: &'static str,
    pub id: String,
}

/// A resource `rm` could not remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionFailure {
    pub kind: &'static str,
    pub id: String,
    pub message: String,
}

/// Outcome of `rm`; failures are reported alongside what was deleted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionResult {
    pub deleted: Vec<DeletedResource>,
    pub failures: Vec<DeletionFailure>,
}

impl DeletionResult {
    pub fn record(&mut self, kind: &'static str, id: impl Into<String>, outcome: Result<(), String>) {
        let id = id.into();
        match outcome {
            Ok(()) => self.deleted.push(DeletedResource { kind, id }),
            Err(message) => self.failures.push(DeletionFailure { kind, id, message }),
        }
    }

    pub fn merge(&mut self, other: DeletionResult) {
        self.deleted.extend(other.deleted);
        self.failures.extend(other.failures);
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A log line read by `log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub timestamp: i64,
    pub stream: String,
    pub message: String,
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.timestamp) {
            Some(ts) => write!(f, "{} {}", ts.format("%Y-%m-%dT%H:%M:%S%.3fZ"), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Point-in-time read of a function's logs; consumed once
pub struct LogStream {
    lines: Box<dyn Iterator<Item = LogLine> + Send>,
}

impl LogStream {
    pub fn new(lines: impl Iterator<Item = LogLine> + Send + 'static) -> Self {
        Self {
            lines: Box::new(lines),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for LogStream {
    type Item = LogLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream").finish_non_exhaustive()
    }
}

/// The five commands, with the same observable semantics for every backend.
///
/// Configurations reaching a provider have already passed the invariant
/// check and the command's field contract.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name, for logs
    fn name(&self) -> &'static str;

    /// Create every resource `config` implies
    async fn init(&self, config: &ResourceConfig) -> Result<ResourceHandle, ProviderError>;

    /// Invoke the configured function with `payload`
    async fn run(
        &self,
        config: &ResourceConfig,
        payload: Bytes,
    ) -> Result<InvocationResult, ProviderError>;

    /// Snapshot of deployed functions, optionally filtered by name
    async fn ls(
        &self,
        config: &ResourceConfig,
        filter: Option<&str>,
    ) -> Result<Vec<ResourceSummary>, ProviderError>;

    /// Delete everything `init` created
    async fn rm(
        &self,
        config: &ResourceConfig,
        target: RmTarget,
    ) -> Result<DeletionResult, ProviderError>;

    /// Read the configured function's logs, optionally of one request
    async fn log(
        &self,
        config: &ResourceConfig,
        request_id: Option<&str>,
    ) -> Result<LogStream, ProviderError>;
}

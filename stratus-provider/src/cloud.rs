//! Cloud SDK boundary
//!
//! [`CloudApi`] is the set of resource calls a provider backend issues. A
//! client is bound to one account and region, like an SDK client.

use crate::error::CloudError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratus_config::InvocationMode;

/// Tag marking resources created by stratus
pub const TAG_MANAGED: &str = "stratus:managed";
/// Tag naming the role stratus created for a function
pub const TAG_ROLE: &str = "stratus:role";
/// Tag naming the function's log group
pub const TAG_LOG_GROUP: &str = "stratus:log-group";
/// Tag naming the bucket whose notifications invoke the function
pub const TAG_TRIGGER: &str = "stratus:trigger";
/// Tag naming the function's HTTP API
pub const TAG_API: &str = "stratus:api";
/// Tag naming the function's batch compute environment
pub const TAG_BATCH: &str = "stratus:batch";

/// Everything needed to create a function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub image: String,
    pub runtime: String,
    pub handler: String,
    pub role_arn: String,
    pub memory: u32,
    pub timeout: u32,
    pub environment: BTreeMap<String, String>,
    pub description: Option<String>,
    pub execution_target: String,
    pub tags: BTreeMap<String, String>,
}

/// A deployed function as reported by the cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub spec: FunctionSpec,
    pub arn: String,
    pub code_sha256: String,
    pub last_modified: DateTime<Utc>,
}

impl FunctionInfo {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.spec.tags.get(key).map(String::as_str)
    }

    pub fn is_managed(&self) -> bool {
        self.tag(TAG_MANAGED) == Some("true")
    }
}

/// Result of invoking a function
#[derive(Debug, Clone)]
pub struct InvokeOutput {
    pub request_id: String,
    pub status_code: u16,
    /// Present for synchronous invocations only
    pub payload: Option<Bytes>,
    pub function_error: Option<String>,
    pub log_stream: String,
}

/// Storage event binding invoking a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketNotification {
    pub bucket: String,
    /// Key prefix, empty for the whole bucket
    pub prefix: String,
    pub function_arn: String,
    pub events: Vec<String>,
}

/// An HTTP front-end routing to a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpApi {
    pub api_id: String,
    pub name: String,
    pub stage: String,
    pub endpoint: String,
    pub function_arn: String,
}

/// Batch compute environment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvironmentSpec {
    pub name: String,
    pub compute_type: String,
    pub environment_type: String,
    pub state: String,
    pub desired_vcpus: u32,
    pub min_vcpus: u32,
    pub max_vcpus: u32,
    pub instance_types: Vec<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub role_arn: String,
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: i64,
    pub stream: String,
    pub message: String,
}

/// Resource calls against one account and region
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Create an execution role and return its ARN
    async fn create_role(
        &self,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, CloudError>;

    /// ARN of an existing role
    async fn get_role(&self, name: &str) -> Result<String, CloudError>;

    async fn delete_role(&self, name: &str) -> Result<(), CloudError>;

    async fn create_log_group(
        &self,
        name: &str,
        retention_days: Option<u32>,
    ) -> Result<(), CloudError>;

    async fn delete_log_group(&self, name: &str) -> Result<(), CloudError>;

    /// Events of a log group, optionally only those of streams containing `stream_filter`
    async fn get_log_events(
        &self,
        group: &str,
        stream_filter: Option<&str>,
    ) -> Result<Vec<LogEvent>, CloudError>;

    async fn create_function(&self, spec: FunctionSpec) -> Result<FunctionInfo, CloudError>;

    async fn get_function(&self, name: &str) -> Result<FunctionInfo, CloudError>;

    async fn list_functions(&self) -> Result<Vec<FunctionInfo>, CloudError>;

    async fn delete_function(&self, name: &str) -> Result<(), CloudError>;

    /// Merge `tags` into a function's tags
    async fn tag_function(
        &self,
        name: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<(), CloudError>;

    async fn invoke(
        &self,
        name: &str,
        payload: Bytes,
        mode: InvocationMode,
    ) -> Result<InvokeOutput, CloudError>;

    async fn put_bucket_notification(
        &self,
        notification: BucketNotification,
    ) -> Result<(), CloudError>;

    async fn delete_bucket_notification(
        &self,
        bucket: &str,
        function_arn: &str,
    ) -> Result<(), CloudError>;

    async fn create_http_api(
        &self,
        name: &str,
        stage: &str,
        function_arn: &str,
    ) -> Result<HttpApi, CloudError>;

    async fn delete_http_api(&self, api_id: &str) -> Result<(), CloudError>;

    /// Create a batch compute environment and return its ARN
    async fn create_batch_environment(
        &self,
        spec: BatchEnvironmentSpec,
    ) -> Result<String, CloudError>;

    async fn delete_batch_environment(&self, name: &str) -> Result<(), CloudError>;
}

//! Emulated cloud
//!
//! Keeps roles, log groups, functions, bucket notifications, HTTP APIs and
//! batch environments in region-scoped in-memory stores. With a state
//! directory the whole store is loaded on open and written back after every
//! mutation, so successive CLI processes see the same resources.

use crate::cloud::{
    BatchEnvironmentSpec, BucketNotification, CloudApi, FunctionInfo, FunctionSpec, HttpApi,
    InvokeOutput, LogEvent, TAG_LOG_GROUP,
};
use crate::error::CloudError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use stratus_config::InvocationMode;
use stratus_core::{AccountRegionKey, RequestId, StateStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";
pub const DEFAULT_REGION: &str = "us-east-1";

/// File holding the emulated cloud inside a state directory
const STATE_FILE: &str = "cloud.json";

/// Runs a function's payload for synchronous local invocations
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn execute(&self, function: &FunctionInfo, payload: Bytes) -> Result<Bytes, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role_name: String,
    pub role_id: String,
    pub arn: String,
    pub create_date: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogGroupRecord {
    pub log_group_name: String,
    pub creation_time: i64,
    pub retention_days: Option<u32>,
    pub events: Vec<LogEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEnvironmentRecord {
    pub spec: BatchEnvironmentSpec,
    pub arn: String,
    pub created: DateTime<Utc>,
}

/// Everything that exists in one account and region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionState {
    pub roles: BTreeMap<String, RoleRecord>,
    pub log_groups: BTreeMap<String, LogGroupRecord>,
    pub functions: BTreeMap<String, FunctionInfo>,
    /// Notifications keyed by bucket
    pub notifications: BTreeMap<String, Vec<BucketNotification>>,
    pub apis: BTreeMap<String, HttpApi>,
    pub batch_environments: BTreeMap<String, BatchEnvironmentRecord>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    regions: Vec<(AccountRegionKey, RegionState)>,
}

/// In-memory cloud bound to one account and region
pub struct LocalCloud {
    scope: AccountRegionKey,
    store: StateStore<RegionState>,
    state_file: Option<PathBuf>,
    executor: Option<Arc<dyn FunctionExecutor>>,
}

impl LocalCloud {
    /// A cloud that lives only as long as this value
    pub fn ephemeral(account_id: &str, region: &str) -> Self {
        Self {
            scope: AccountRegionKey::new(account_id, region),
            store: StateStore::new(),
            state_file: None,
            executor: None,
        }
    }

    /// Load the cloud persisted in `dir`, creating the directory if needed
    pub fn open(dir: &Path, account_id: &str, region: &str) -> Result<Self, CloudError> {
        std::fs::create_dir_all(dir)?;
        let state_file = dir.join(STATE_FILE);

        let store = if state_file.exists() {
            let data = std::fs::read(&state_file)?;
            let snapshot: Snapshot = serde_json::from_slice(&data)
                .map_err(|e| CloudError::State(format!("{}: {e}", state_file.display())))?;
            StateStore::from_entries(snapshot.regions)
        } else {
            StateStore::new()
        };

        debug!(state_file = %state_file.display(), region, "Opened local cloud");

        Ok(Self {
            scope: AccountRegionKey::new(account_id, region),
            store,
            state_file: Some(state_file),
            executor: None,
        })
    }

    /// Run synchronous invocations through `executor`
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn FunctionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    fn read<T>(&self, f: impl FnOnce(&RegionState) -> T) -> T {
        let state = self.store.get_or_create(&self.scope.account_id, &self.scope.region);
        f(&state)
    }

    /// Apply `f` to this region's state and persist the result if it succeeded
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RegionState) -> Result<T, CloudError>,
    ) -> Result<T, CloudError> {
        let value = {
            let mut state = self.store.get_or_create(&self.scope.account_id, &self.scope.region);
            f(&mut state)?
        };
        self.persist().await?;
        Ok(value)
    }

    async fn persist(&self) -> Result<(), CloudError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };

        let snapshot = Snapshot {
            regions: self.store.snapshot(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CloudError::State(e.to_string()))?;

        // Write then rename so a killed process never leaves half a file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.scope.region, self.scope.account_id, resource
        )
    }

    fn generate_id(prefix: &str, len: usize) -> String {
        let id = Uuid::new_v4().simple().to_string().to_uppercase();
        format!("{}{}", prefix, &id[..len])
    }
}

/// Digest of a function's rendered configuration
fn code_sha256(spec: &FunctionSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(spec).unwrap_or_default());
    general_purpose::STANDARD.encode(hasher.finalize())
}

fn append_events(state: &mut RegionState, group: &str, stream: &str, messages: &[String]) {
    let now = Utc::now().timestamp_millis();

    // Invocations log even when the group was removed out of band
    let group = state
        .log_groups
        .entry(group.to_string())
        .or_insert_with(|| LogGroupRecord {
            log_group_name: group.to_string(),
            creation_time: now,
            retention_days: None,
            events: Vec::new(),
        });

    for message in messages {
        group.events.push(LogEvent {
            timestamp: now,
            stream: stream.to_string(),
            message: message.clone(),
        });
    }
}

#[async_trait]
impl CloudApi for LocalCloud {
    async fn create_role(
        &self,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, CloudError> {
        let arn = format!("arn:aws:iam::{}:role/{}", self.scope.account_id, name);
        let role = RoleRecord {
            role_name: name.to_string(),
            role_id: Self::generate_id("AROA", 17),
            arn: arn.clone(),
            create_date: Utc::now(),
            tags: tags.clone(),
        };

        self.mutate(|state| {
            if state.roles.contains_key(name) {
                return Err(CloudError::already_exists("Role", name));
            }
            state.roles.insert(name.to_string(), role);
            Ok(())
        })
        .await?;

        info!(role = %name, "Created role");
        Ok(arn)
    }

    async fn get_role(&self, name: &str) -> Result<String, CloudError> {
        self.read(|state| state.roles.get(name).map(|r| r.arn.clone()))
            .ok_or_else(|| CloudError::not_found("Role", name))
    }

    async fn delete_role(&self, name: &str) -> Result<(), CloudError> {
        self.mutate(|state| {
            state
                .roles
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CloudError::not_found("Role", name))
        })
        .await
    }

    async fn create_log_group(
        &self,
        name: &str,
        retention_days: Option<u32>,
    ) -> Result<(), CloudError> {
        self.mutate(|state| {
            if state.log_groups.contains_key(name) {
                return Err(CloudError::already_exists("Log group", name));
            }
            state.log_groups.insert(
                name.to_string(),
                LogGroupRecord {
                    log_group_name: name.to_string(),
                    creation_time: Utc::now().timestamp_millis(),
                    retention_days,
                    events: Vec::new(),
                },
            );
            Ok(())
        })
        .await
    }

    async fn delete_log_group(&self, name: &str) -> Result<(), CloudError> {
        self.mutate(|state| {
            state
                .log_groups
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CloudError::not_found("Log group", name))
        })
        .await
    }

    async fn get_log_events(
        &self,
        group: &str,
        stream_filter: Option<&str>,
    ) -> Result<Vec<LogEvent>, CloudError> {
        self.read(|state| {
            let group = state
                .log_groups
                .get(group)
                .ok_or_else(|| CloudError::not_found("Log group", group))?;
            Ok(group
                .events
                .iter()
                .filter(|e| stream_filter.map_or(true, |f| e.stream.contains(f)))
                .cloned()
                .collect())
        })
    }

    async fn create_function(&self, spec: FunctionSpec) -> Result<FunctionInfo, CloudError> {
        if spec.memory == 0 || spec.timeout == 0 {
            return Err(CloudError::InvalidParameter(
                "memory and timeout must be positive".into(),
            ));
        }

        let function = FunctionInfo {
            arn: self.arn("lambda", &format!("function:{}", spec.name)),
            code_sha256: code_sha256(&spec),
            last_modified: Utc::now(),
            spec,
        };

        let created = function.clone();
        self.mutate(move |state| {
            if state.functions.contains_key(&function.spec.name) {
                return Err(CloudError::already_exists("Function", &function.spec.name));
            }
            state.functions.insert(function.spec.name.clone(), function);
            Ok(())
        })
        .await?;

        Ok(created)
    }

    async fn get_function(&self, name: &str) -> Result<FunctionInfo, CloudError> {
        self.read(|state| state.functions.get(name).cloned())
            .ok_or_else(|| CloudError::not_found("Function", name))
    }

    async fn list_functions(&self) -> Result<Vec<FunctionInfo>, CloudError> {
        Ok(self.read(|state| state.functions.values().cloned().collect()))
    }

    async fn delete_function(&self, name: &str) -> Result<(), CloudError> {
        self.mutate(|state| {
            state
                .functions
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CloudError::not_found("Function", name))
        })
        .await?;

        info!(function_name = %name, "Deleted function");
        Ok(())
    }

    async fn tag_function(
        &self,
        name: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        self.mutate(|state| {
            let function = state
                .functions
                .get_mut(name)
                .ok_or_else(|| CloudError::not_found("Function", name))?;
            function.spec.tags.extend(tags);
            Ok(())
        })
        .await
    }

    async fn invoke(
        &self,
        name: &str,
        payload: Bytes,
        mode: InvocationMode,
    ) -> Result<InvokeOutput, CloudError> {
        let function = self.get_function(name).await?;
        let request_id = RequestId::new();
        let log_stream = request_id.log_stream_name(&Utc::now().format("%Y/%m/%d").to_string());
        let log_group = function
            .tag(TAG_LOG_GROUP)
            .map(str::to_string)
            .unwrap_or_else(|| format!("/aws/lambda/{name}"));

        let started = Instant::now();
        let mut messages = vec![format!("START RequestId: {request_id} Version: $LATEST")];

        let (output, function_error) = match (&self.executor, mode) {
            (_, InvocationMode::Event) => (None, None),
            (None, InvocationMode::RequestResponse) => {
                messages.push("No executor attached; invocation recorded only".to_string());
                (Some(Bytes::new()), None)
            }
            (Some(executor), InvocationMode::RequestResponse) => {
                match executor.execute(&function, payload).await {
                    Ok(output) => (Some(output), None),
                    Err(message) => {
                        warn!(function_name = %name, error = %message, "Function execution failed");
                        messages.push(format!("ERROR {message}"));
                        let body = serde_json::json!({
                            "errorMessage": message,
                            "errorType": "Runtime.UnhandledError",
                        });
                        (
                            Some(Bytes::from(body.to_string())),
                            Some("Unhandled".to_string()),
                        )
                    }
                }
            }
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        messages.push(format!("END RequestId: {request_id}"));
        messages.push(format!(
            "REPORT RequestId: {request_id}\tDuration: {duration_ms:.2} ms\tMemory Size: {} MB",
            function.spec.memory
        ));

        self.mutate(|state| {
            append_events(state, &log_group, &log_stream, &messages);
            Ok(())
        })
        .await?;

        Ok(InvokeOutput {
            request_id: request_id.id,
            status_code: if mode.is_async() { 202 } else { 200 },
            payload: output,
            function_error,
            log_stream,
        })
    }

    async fn put_bucket_notification(
        &self,
        notification: BucketNotification,
    ) -> Result<(), CloudError> {
        if notification.bucket.is_empty() {
            return Err(CloudError::InvalidParameter("bucket name is empty".into()));
        }

        self.mutate(|state| {
            let bindings = state
                .notifications
                .entry(notification.bucket.clone())
                .or_default();
            bindings.retain(|n| n.function_arn != notification.function_arn);
            bindings.push(notification);
            Ok(())
        })
        .await
    }

    async fn delete_bucket_notification(
        &self,
        bucket: &str,
        function_arn: &str,
    ) -> Result<(), CloudError> {
        self.mutate(|state| {
            let bindings = state
                .notifications
                .get_mut(bucket)
                .ok_or_else(|| CloudError::not_found("Bucket notification", bucket))?;
            let before = bindings.len();
            bindings.retain(|n| n.function_arn != function_arn);
            if bindings.len() == before {
                return Err(CloudError::not_found("Bucket notification", bucket));
            }
            if bindings.is_empty() {
                state.notifications.remove(bucket);
            }
            Ok(())
        })
        .await
    }

    async fn create_http_api(
        &self,
        name: &str,
        stage: &str,
        function_arn: &str,
    ) -> Result<HttpApi, CloudError> {
        let api_id = Self::generate_id("", 10).to_lowercase();
        let api = HttpApi {
            endpoint: format!(
                "https://{}.execute-api.{}.localhost/{}",
                api_id, self.scope.region, stage
            ),
            api_id: api_id.clone(),
            name: name.to_string(),
            stage: stage.to_string(),
            function_arn: function_arn.to_string(),
        };

        let created = api.clone();
        self.mutate(move |state| {
            state.apis.insert(api_id, api);
            Ok(())
        })
        .await?;
        Ok(created)
    }

    async fn delete_http_api(&self, api_id: &str) -> Result<(), CloudError> {
        self.mutate(|state| {
            state
                .apis
                .remove(api_id)
                .map(|_| ())
                .ok_or_else(|| CloudError::not_found("HTTP API", api_id))
        })
        .await
    }

    async fn create_batch_environment(
        &self,
        spec: BatchEnvironmentSpec,
    ) -> Result<String, CloudError> {
        if spec.min_vcpus > spec.max_vcpus {
            return Err(CloudError::InvalidParameter(
                "min_vcpus exceeds max_vcpus".into(),
            ));
        }

        let arn = self.arn("batch", &format!("compute-environment/{}", spec.name));
        let record = BatchEnvironmentRecord {
            spec,
            arn: arn.clone(),
            created: Utc::now(),
        };

        self.mutate(move |state| {
            if state.batch_environments.contains_key(&record.spec.name) {
                return Err(CloudError::already_exists(
                    "Compute environment",
                    &record.spec.name,
                ));
            }
            state
                .batch_environments
                .insert(record.spec.name.clone(), record);
            Ok(())
        })
        .await?;

        Ok(arn)
    }

    async fn delete_batch_environment(&self, name: &str) -> Result<(), CloudError> {
        self.mutate(|state| {
            state
                .batch_environments
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CloudError::not_found("Compute environment", name))
        })
        .await
    }
}

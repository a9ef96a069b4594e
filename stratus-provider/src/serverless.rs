//! Provider backend over a serverless cloud client

use crate::cloud::{
    BatchEnvironmentSpec, BucketNotification, CloudApi, FunctionInfo, FunctionSpec,
    TAG_API, TAG_BATCH, TAG_LOG_GROUP, TAG_MANAGED, TAG_ROLE, TAG_TRIGGER,
};
use crate::contract::{
    DeletionResult, InvocationResult, LogLine, LogStream, Provider, ResourceHandle,
    ResourceSummary, RmTarget,
};
use crate::error::{CloudError, ProviderError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use stratus_config::{ExecutionTarget, ResourceConfig};
use tracing::{debug, info, warn};

/// Object events that trigger a function
const TRIGGER_EVENTS: &[&str] = &["s3:ObjectCreated:*"];

/// Implements the command contract with a [`CloudApi`] client
pub struct ServerlessProvider<C> {
    cloud: C,
}

impl<C: CloudApi> ServerlessProvider<C> {
    pub fn new(cloud: C) -> Self {
        Self { cloud }
    }

    async fn function(&self, name: &str) -> Result<FunctionInfo, ProviderError> {
        self.cloud.get_function(name).await.map_err(|e| match e {
            CloudError::NotFound { .. } => ProviderError::NotFound(name.to_string()),
            other => other.into(),
        })
    }

    /// Steps of `init` after the existence check; fills `handle` as it goes
    async fn provision(
        &self,
        config: &ResourceConfig,
        name: &str,
        handle: &mut ResourceHandle,
    ) -> Result<(), ProviderError> {
        let compute = config.compute.clone().unwrap_or_default();
        let image = compute
            .image
            .clone()
            .ok_or_else(|| CloudError::InvalidParameter("compute.image is required".into()))?;

        let mut tags: BTreeMap<String, String> = config.tags.clone();
        tags.insert(TAG_MANAGED.to_string(), "true".to_string());

        let role_arn = match config.supplied_role() {
            Some(role) => role.to_string(),
            None => {
                let role_name = format!("{name}-stratus-role");
                // Only a role created here is recorded, so `rm` never deletes one it did not make
                match self.cloud.create_role(&role_name, &tags).await {
                    Ok(arn) => {
                        handle.managed_role = Some(role_name.clone());
                        tags.insert(TAG_ROLE.to_string(), role_name);
                        arn
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(role = %role_name, "Reusing existing role");
                        self.cloud.get_role(&role_name).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        handle.role_arn = Some(role_arn.clone());

        let log_group = config
            .log_group_name()
            .unwrap_or_else(|| format!("/aws/lambda/{name}"));
        match self
            .cloud
            .create_log_group(&log_group, config.retention_days())
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                debug!(log_group = %log_group, "Log group already exists");
            }
            Err(e) => return Err(e.into()),
        }
        handle.log_group = Some(log_group.clone());
        tags.insert(TAG_LOG_GROUP.to_string(), log_group);

        let target = config.execution_target();
        let spec = FunctionSpec {
            name: name.to_string(),
            image,
            runtime: compute.runtime_or_default().to_string(),
            handler: compute.handler_or_default().to_string(),
            role_arn: role_arn.clone(),
            memory: compute.memory_or_default(),
            timeout: compute.timeout_or_default(),
            environment: compute.environment.clone(),
            description: compute.description.clone(),
            execution_target: target.as_str().to_string(),
            tags,
        };
        let function = match self.cloud.create_function(spec).await {
            Ok(function) => function,
            Err(e) if e.is_already_exists() => {
                return Err(ProviderError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        handle.function_arn = Some(function.arn.clone());
        info!(function_name = %name, arn = %function.arn, "Created function");

        if let (ExecutionTarget::BatchJob, Some(batch)) = (target, &config.batch) {
            let env_name = format!("{name}-stratus-batch");
            let spec = BatchEnvironmentSpec {
                name: env_name.clone(),
                compute_type: batch.compute_type.clone(),
                environment_type: batch.environment_type().to_string(),
                state: batch.state().to_string(),
                desired_vcpus: batch.desired_vcpus,
                min_vcpus: batch.min_vcpus,
                max_vcpus: batch.max_vcpus,
                instance_types: batch.instance_types.clone(),
                subnets: batch.subnets.clone(),
                security_groups: batch.security_groups.clone(),
                role_arn: role_arn.clone(),
            };
            self.cloud.create_batch_environment(spec).await?;
            handle.batch_environment = Some(env_name.clone());
            self.tag(name, TAG_BATCH, &env_name).await?;
        }

        if let Some(input) = config.storage.as_ref().and_then(|s| s.input.as_ref()) {
            let notification = BucketNotification {
                bucket: input.bucket.clone(),
                prefix: input.key_prefix(),
                function_arn: function.arn.clone(),
                events: TRIGGER_EVENTS.iter().map(|e| (*e).to_string()).collect(),
            };
            self.cloud.put_bucket_notification(notification).await?;
            handle.trigger = Some(input.join());
            self.tag(name, TAG_TRIGGER, &input.bucket).await?;
        }

        if let Some(api) = &config.api {
            let api_name = api.name().unwrap_or(name);
            let created = self
                .cloud
                .create_http_api(api_name, api.stage(), &function.arn)
                .await?;
            handle.api_id = Some(created.api_id.clone());
            handle.api_endpoint = Some(created.endpoint.clone());
            self.tag(name, TAG_API, &created.api_id).await?;
        }

        Ok(())
    }

    async fn tag(&self, name: &str, key: &str, value: &str) -> Result<(), CloudError> {
        let tags = BTreeMap::from([(key.to_string(), value.to_string())]);
        self.cloud.tag_function(name, tags).await
    }

    /// Remove a function and everything recorded in its tags
    async fn remove_function(&self, function: &FunctionInfo) -> DeletionResult {
        let mut result = DeletionResult::default();

        if let Some(api_id) = function.tag(TAG_API) {
            let outcome = self.cloud.delete_http_api(api_id).await;
            result.record("http-api", api_id, tolerate_missing(outcome));
        }
        if let Some(bucket) = function.tag(TAG_TRIGGER) {
            let outcome = self
                .cloud
                .delete_bucket_notification(bucket, &function.arn)
                .await;
            result.record("trigger", bucket, tolerate_missing(outcome));
        }
        if let Some(env) = function.tag(TAG_BATCH) {
            let outcome = self.cloud.delete_batch_environment(env).await;
            result.record("batch-environment", env, tolerate_missing(outcome));
        }

        let outcome = self.cloud.delete_function(function.name()).await;
        result.record("function", function.name(), tolerate_missing(outcome));

        if let Some(group) = function.tag(TAG_LOG_GROUP) {
            let outcome = self.cloud.delete_log_group(group).await;
            result.record("log-group", group, tolerate_missing(outcome));
        }
        if let Some(role) = function.tag(TAG_ROLE) {
            let outcome = self.cloud.delete_role(role).await;
            result.record("role", role, tolerate_missing(outcome));
        }

        for failure in &result.failures {
            warn!(
                function_name = %function.name(),
                kind = failure.kind,
                id = %failure.id,
                error = %failure.message,
                "Failed to delete resource"
            );
        }
        result
    }
}

/// A resource that is already gone counts as deleted
fn tolerate_missing(outcome: Result<(), CloudError>) -> Result<(), String> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

fn summary(function: &FunctionInfo) -> ResourceSummary {
    let trigger = function.tag(TAG_TRIGGER).map(str::to_string);
    ResourceSummary {
        name: function.spec.name.clone(),
        arn: function.arn.clone(),
        image: function.spec.image.clone(),
        memory: function.spec.memory,
        timeout: function.spec.timeout,
        runtime: function.spec.runtime.clone(),
        execution_target: function.spec.execution_target.clone(),
        code_sha256: function.code_sha256.clone(),
        last_modified: function.last_modified.to_rfc3339(),
        trigger,
        api_id: function.tag(TAG_API).map(str::to_string),
    }
}

fn configured_name(config: &ResourceConfig) -> Result<&str, ProviderError> {
    config
        .name()
        .ok_or_else(|| CloudError::InvalidParameter("compute.name is required".into()).into())
}

#[async_trait]
impl<C: CloudApi> Provider for ServerlessProvider<C> {
    fn name(&self) -> &'static str {
        "serverless"
    }

    async fn init(&self, config: &ResourceConfig) -> Result<ResourceHandle, ProviderError> {
        let name = configured_name(config)?;

        match self.cloud.get_function(name).await {
            Ok(_) => return Err(ProviderError::AlreadyExists(name.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let mut handle = ResourceHandle::new(name);
        match self.provision(config, name, &mut handle).await {
            Ok(()) => Ok(handle),
            Err(e) if handle.is_empty() => Err(e),
            Err(e) => {
                warn!(function_name = %name, error = %e, "Provisioning stopped part way");
                Err(ProviderError::Provisioning {
                    message: e.to_string(),
                    partial: Box::new(handle),
                })
            }
        }
    }

    async fn run(
        &self,
        config: &ResourceConfig,
        payload: Bytes,
    ) -> Result<InvocationResult, ProviderError> {
        let name = configured_name(config)?;
        let function = self.function(name).await?;
        let mode = config
            .compute
            .as_ref()
            .map(|c| c.invocation_mode_or_default())
            .unwrap_or_default();

        let output = self
            .cloud
            .invoke(name, payload, mode)
            .await
            .map_err(|e| match e {
                CloudError::NotFound { .. } => ProviderError::NotFound(name.to_string()),
                CloudError::Execution(message) => ProviderError::Invocation(message),
                other => other.into(),
            })?;

        info!(
            function_name = %name,
            request_id = %output.request_id,
            mode = mode.as_str(),
            "Invoked function"
        );

        let log_group = function
            .tag(TAG_LOG_GROUP)
            .map(str::to_string)
            .unwrap_or_else(|| format!("/aws/lambda/{name}"));

        Ok(InvocationResult {
            function_name: name.to_string(),
            request_id: output.request_id,
            status_code: output.status_code,
            log_group,
            log_stream: output.log_stream,
            output: output.payload,
            function_error: output.function_error,
        })
    }

    async fn ls(
        &self,
        _config: &ResourceConfig,
        filter: Option<&str>,
    ) -> Result<Vec<ResourceSummary>, ProviderError> {
        let mut functions: Vec<_> = self
            .cloud
            .list_functions()
            .await?
            .into_iter()
            .filter(FunctionInfo::is_managed)
            .filter(|f| filter.map_or(true, |needle| f.name().contains(needle)))
            .collect();
        functions.sort_by(|a, b| a.name().cmp(b.name()));

        Ok(functions.iter().map(summary).collect())
    }

    async fn rm(
        &self,
        config: &ResourceConfig,
        target: RmTarget,
    ) -> Result<DeletionResult, ProviderError> {
        match target {
            RmTarget::Named => {
                let name = configured_name(config)?;
                let function = self.function(name).await?;
                let result = self.remove_function(&function).await;
                info!(function_name = %name, deleted = result.deleted.len(), "Removed function");
                Ok(result)
            }
            RmTarget::All => {
                let mut result = DeletionResult::default();
                for function in self.cloud.list_functions().await? {
                    if function.is_managed() {
                        result.merge(self.remove_function(&function).await);
                    }
                }
                info!(deleted = result.deleted.len(), "Removed all managed functions");
                Ok(result)
            }
        }
    }

    async fn log(
        &self,
        config: &ResourceConfig,
        request_id: Option<&str>,
    ) -> Result<LogStream, ProviderError> {
        let name = configured_name(config)?;
        let function = self.function(name).await?;
        let group = function
            .tag(TAG_LOG_GROUP)
            .map(str::to_string)
            .or_else(|| config.log_group_name())
            .unwrap_or_else(|| format!("/aws/lambda/{name}"));

        // Streams are named after the first eight characters of the request id
        let stream_filter = request_id.map(|id| id.get(..8).unwrap_or(id));
        let events = match self.cloud.get_log_events(&group, stream_filter).await {
            Ok(events) => events,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(LogStream::new(events.into_iter().map(|event| LogLine {
            timestamp: event.timestamp,
            stream: event.stream,
            message: event.message,
        })))
    }
}

//! Compute section: what runs and how it is invoked

use crate::value::{merge_extra, put, string_map_value, RawSection};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default function memory in MB
pub const DEFAULT_MEMORY: u32 = 512;
/// Default function timeout in seconds
pub const DEFAULT_TIMEOUT: u32 = 300;
/// Runtime used when none is configured; the sandbox supervisor is a native binary
pub const DEFAULT_RUNTIME: &str = "provided.al2023";
/// Handler used when none is configured
pub const DEFAULT_HANDLER: &str = "bootstrap";

/// Compute primitive backing a deployed function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionTarget {
    /// Single-invocation serverless function
    #[default]
    Function,
    /// Batch job submitted to a compute environment
    BatchJob,
}

impl ExecutionTarget {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "function" | "lambda" => Some(Self::Function),
            "batch-job" | "batch" => Some(Self::BatchJob),
            _ => None,
        }
    }

    /// Target implied by a top-level execution mode, `None` if the mode is unknown
    pub fn from_execution_mode(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "lambda" | "function" => Some(Self::Function),
            "batch" | "lambda-batch" => Some(Self::BatchJob),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::BatchJob => "batch-job",
        }
    }
}

/// How `run` waits for the function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationMode {
    /// Synchronous invocation (wait for response)
    #[default]
    RequestResponse,
    /// Asynchronous invocation (fire and forget)
    Event,
}

impl InvocationMode {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request-response" | "requestresponse" | "sync" | "synchronous" => {
                Some(Self::RequestResponse)
            }
            "event" | "async" | "asynchronous" => Some(Self::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestResponse => "request-response",
            Self::Event => "event",
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Event)
    }
}

/// Function configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeConfig {
    pub name: Option<String>,
    pub execution_target: Option<ExecutionTarget>,
    pub memory: Option<u32>,
    pub timeout: Option<u32>,
    pub image: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub invocation_mode: Option<InvocationMode>,
    pub runtime: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub handler: Option<String>,
    /// Script reference sent by `run` when none is given explicitly
    pub script: Option<String>,
    /// Unrecognized or malformed keys, kept verbatim
    pub extra: Map<String, Value>,
}

impl ComputeConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut section = RawSection::new("compute", raw);

        Self {
            name: section.take_string("name"),
            execution_target: section.take_parsed("execution_target", ExecutionTarget::from_str),
            memory: section.take_u32("memory"),
            timeout: section.take_u32("timeout"),
            image: section.take_string("image"),
            environment: section.take_string_map("environment").unwrap_or_default(),
            invocation_mode: section.take_parsed("invocation_mode", InvocationMode::from_str),
            runtime: section.take_string("runtime"),
            role: section.take_string("role"),
            description: section.take_string("description"),
            handler: section.take_string("handler"),
            script: section.take_string("script"),
            extra: section.into_extra(),
        }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        put(&mut map, "name", self.name.clone());
        put(
            &mut map,
            "execution_target",
            self.execution_target.map(|t| t.as_str()),
        );
        put(&mut map, "memory", self.memory);
        put(&mut map, "timeout", self.timeout);
        put(&mut map, "image", self.image.clone());
        if !self.environment.is_empty() {
            map.insert("environment".to_string(), string_map_value(&self.environment));
        }
        put(
            &mut map,
            "invocation_mode",
            self.invocation_mode.map(|m| m.as_str()),
        );
        put(&mut map, "runtime", self.runtime.clone());
        put(&mut map, "role", self.role.clone());
        put(&mut map, "description", self.description.clone());
        put(&mut map, "handler", self.handler.clone());
        put(&mut map, "script", self.script.clone());
        merge_extra(&mut map, &self.extra);
        map
    }

    pub fn memory_or_default(&self) -> u32 {
        self.memory.unwrap_or(DEFAULT_MEMORY)
    }

    pub fn timeout_or_default(&self) -> u32 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn runtime_or_default(&self) -> &str {
        self.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME)
    }

    pub fn handler_or_default(&self) -> &str {
        self.handler.as_deref().unwrap_or(DEFAULT_HANDLER)
    }

    pub fn invocation_mode_or_default(&self) -> InvocationMode {
        self.invocation_mode.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compute(value: Value) -> ComputeConfig {
        ComputeConfig::from_raw(value.as_object().unwrap())
    }

    #[test]
    fn test_typed_fields() {
        let config = compute(json!({
            "name": "blur",
            "execution_target": "batch",
            "memory": "1024",
            "timeout": 60,
            "image": "grycap/blur",
            "environment": {"LEVEL": 3},
            "invocation_mode": "async",
        }));

        assert_eq!(config.name.as_deref(), Some("blur"));
        assert_eq!(config.execution_target, Some(ExecutionTarget::BatchJob));
        assert_eq!(config.memory, Some(1024));
        assert_eq!(config.timeout, Some(60));
        assert_eq!(config.environment["LEVEL"], "3");
        assert_eq!(config.invocation_mode, Some(InvocationMode::Event));
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_unknown_target_is_kept_verbatim() {
        let config = compute(json!({"execution_target": "vm"}));
        assert_eq!(config.execution_target, None);
        assert_eq!(config.extra["execution_target"], json!("vm"));
        assert_eq!(config.to_raw()["execution_target"], json!("vm"));
    }

    #[test]
    fn test_defaults() {
        let config = ComputeConfig::default();
        assert_eq!(config.memory_or_default(), DEFAULT_MEMORY);
        assert_eq!(config.timeout_or_default(), DEFAULT_TIMEOUT);
        assert_eq!(config.runtime_or_default(), DEFAULT_RUNTIME);
        assert_eq!(config.invocation_mode_or_default(), InvocationMode::RequestResponse);
    }

    #[test]
    fn test_execution_mode_mapping() {
        assert_eq!(ExecutionTarget::from_execution_mode("lambda"), Some(ExecutionTarget::Function));
        assert_eq!(ExecutionTarget::from_execution_mode("batch"), Some(ExecutionTarget::BatchJob));
        assert_eq!(
            ExecutionTarget::from_execution_mode("lambda-batch"),
            Some(ExecutionTarget::BatchJob)
        );
        assert_eq!(ExecutionTarget::from_execution_mode("container"), None);
    }
}

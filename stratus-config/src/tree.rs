//! Normalized resource configuration
//!
//! [`ResourceConfig`] is built once per command from a raw nested mapping.
//! Construction is pure and infallible: missing sections stay `None`,
//! unknown keys are carried in `extra` and malformed values are kept
//! verbatim for the validation gate to report. Presence requirements are
//! enforced later by [`crate::gate::require`].

use crate::batch::BatchConfig;
use crate::compute::{ComputeConfig, ExecutionTarget};
use crate::error::ConfigError;
use crate::sections::{ApiConfig, IdentityConfig, LoggingConfig};
use crate::storage::StorageConfig;
use crate::value::{merge_extra, put, string_map_value, RawSection};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const MIN_MEMORY: u32 = 128;
pub const MAX_MEMORY: u32 = 10240;
pub const MAX_TIMEOUT: u32 = 900;

static FUNCTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid function name pattern"));

/// Root configuration keyed by resource kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceConfig {
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub execution_mode: Option<String>,
    pub compute: Option<ComputeConfig>,
    pub storage: Option<StorageConfig>,
    pub identity: Option<IdentityConfig>,
    pub logging: Option<LoggingConfig>,
    pub batch: Option<BatchConfig>,
    pub api: Option<ApiConfig>,
    pub tags: BTreeMap<String, String>,
    /// Unrecognized top-level keys, never interpreted
    pub extra: Map<String, Value>,
}

impl ResourceConfig {
    /// Build from any JSON value; anything but an object is empty input
    pub fn from_value(raw: &Value) -> Self {
        raw.as_object().map(Self::from_raw).unwrap_or_default()
    }

    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut root = RawSection::new("root", raw);

        Self {
            account_id: root.take_scalar("account_id"),
            region: root.take_string("region"),
            execution_mode: root.take_string("execution_mode"),
            compute: root.take_section("compute", ComputeConfig::from_raw),
            storage: root.take_section("storage", StorageConfig::from_raw),
            identity: root.take_section("identity", IdentityConfig::from_raw),
            logging: root.take_section("logging", LoggingConfig::from_raw),
            batch: root.take_section("batch", BatchConfig::from_raw),
            api: root.take_section("api", ApiConfig::from_raw),
            tags: root.take_string_map("tags").unwrap_or_default(),
            extra: root.into_extra(),
        }
    }

    /// Render the normalized tree back into a raw mapping.
    ///
    /// `from_raw(&config.to_raw())` yields `config` again.
    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        put(&mut map, "account_id", self.account_id.clone());
        put(&mut map, "region", self.region.clone());
        put(&mut map, "execution_mode", self.execution_mode.clone());
        put(&mut map, "compute", self.compute.as_ref().map(|c| Value::Object(c.to_raw())));
        put(&mut map, "storage", self.storage.as_ref().map(|s| Value::Object(s.to_raw())));
        put(&mut map, "identity", self.identity.as_ref().map(|i| Value::Object(i.to_raw())));
        put(&mut map, "logging", self.logging.as_ref().map(|l| Value::Object(l.to_raw())));
        put(&mut map, "batch", self.batch.as_ref().map(|b| Value::Object(b.to_raw())));
        put(&mut map, "api", self.api.as_ref().map(|a| Value::Object(a.to_raw())));
        if !self.tags.is_empty() {
            map.insert("tags".to_string(), string_map_value(&self.tags));
        }
        merge_extra(&mut map, &self.extra);
        map
    }

    /// Re-run normalization over the rendered tree
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self::from_raw(&self.to_raw())
    }

    /// Resolve a dotted path such as `compute.image`
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let raw = Value::Object(self.to_raw());
        path.split('.')
            .try_fold(&raw, |value, key| value.get(key))
            .cloned()
    }

    pub fn name(&self) -> Option<&str> {
        self.compute.as_ref()?.name.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.compute.as_ref()?.image.as_deref()
    }

    /// Explicit target, else the one implied by `execution_mode`
    pub fn execution_target(&self) -> ExecutionTarget {
        self.compute
            .as_ref()
            .and_then(|c| c.execution_target)
            .or_else(|| {
                self.execution_mode
                    .as_deref()
                    .and_then(ExecutionTarget::from_execution_mode)
            })
            .unwrap_or_default()
    }

    /// Role supplied by the user, if any
    pub fn supplied_role(&self) -> Option<&str> {
        self.compute
            .as_ref()
            .and_then(|c| c.role.as_deref())
            .or_else(|| self.identity.as_ref()?.role.as_deref())
    }

    /// Log group for the function named in this configuration
    pub fn log_group_name(&self) -> Option<String> {
        if let Some(group) = self.logging.as_ref().and_then(|l| l.group.clone()) {
            return Some(group);
        }
        self.name().map(|name| format!("/aws/lambda/{name}"))
    }

    pub fn retention_days(&self) -> Option<u32> {
        self.logging.as_ref()?.retention_days
    }

    /// A copy of this configuration targeting another function
    #[must_use]
    pub fn with_name(&self, name: &str) -> Self {
        let mut config = self.clone();
        config.compute.get_or_insert_with(ComputeConfig::default).name = Some(name.to_string());
        config
    }

    /// Check cross-section consistency.
    ///
    /// Runs before any command-specific validation.
    pub fn check_invariants(&self) -> Result<(), ConfigError> {
        if let Some(mode) = &self.execution_mode {
            if ExecutionTarget::from_execution_mode(mode).is_none() {
                return Err(ConfigError::invariant(
                    "execution_mode",
                    format!("unknown mode '{mode}', expected lambda or batch"),
                ));
            }
        }

        // Unparseable values stay in `extra` and must not fall back to defaults
        if let Some(compute) = &self.compute {
            let enums = [
                ("execution_target", "function or batch-job"),
                ("invocation_mode", "request-response or event"),
            ];
            for (key, expected) in enums {
                if let Some(value) = compute.extra.get(key) {
                    return Err(ConfigError::invariant(
                        format!("compute.{key}"),
                        format!("unknown value {value}, expected {expected}"),
                    ));
                }
            }
        }

        match (self.execution_target(), &self.batch) {
            (ExecutionTarget::BatchJob, None) => {
                return Err(ConfigError::invariant(
                    "batch",
                    "execution target batch-job requires a batch section",
                ));
            }
            (ExecutionTarget::Function, Some(_)) => {
                return Err(ConfigError::invariant(
                    "batch",
                    "a batch section requires execution target batch-job",
                ));
            }
            _ => {}
        }

        if let Some(storage) = &self.storage {
            for (field, path) in storage.locations() {
                if path.bucket.is_empty() {
                    return Err(ConfigError::invariant(field, "bucket name is empty"));
                }
            }
        }

        if let Some(compute) = &self.compute {
            if let Some(name) = &compute.name {
                if !FUNCTION_NAME.is_match(name) {
                    return Err(ConfigError::invariant(
                        "compute.name",
                        "must be 1-64 letters, digits, hyphens or underscores",
                    ));
                }
            }
            if let Some(memory) = compute.memory {
                if !(MIN_MEMORY..=MAX_MEMORY).contains(&memory) {
                    return Err(ConfigError::invariant(
                        "compute.memory",
                        format!("must be between {MIN_MEMORY} and {MAX_MEMORY} MB"),
                    ));
                }
            }
            if let Some(timeout) = compute.timeout {
                if !(1..=MAX_TIMEOUT).contains(&timeout) {
                    return Err(ConfigError::invariant(
                        "compute.timeout",
                        format!("must be between 1 and {MAX_TIMEOUT} seconds"),
                    ));
                }
            }
        }

        if let Some(batch) = &self.batch {
            if batch.min_vcpus > batch.desired_vcpus || batch.desired_vcpus > batch.max_vcpus {
                return Err(ConfigError::invariant(
                    "batch.desired_vcpus",
                    "must lie between min_vcpus and max_vcpus",
                ));
            }
        }

        Ok(())
    }
}

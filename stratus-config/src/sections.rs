//! Identity, logging and API front-end sections

use crate::value::{merge_extra, put, RawSection};
use serde_json::{Map, Value};

/// Execution role reference
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentityConfig {
    pub role: Option<String>,
    pub extra: Map<String, Value>,
}

impl IdentityConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut section = RawSection::new("identity", raw);
        Self {
            role: section.take_string("role"),
            extra: section.into_extra(),
        }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        put(&mut map, "role", self.role.clone());
        merge_extra(&mut map, &self.extra);
        map
    }
}

/// Log group settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingConfig {
    /// `None` keeps the provider's default retention
    pub retention_days: Option<u32>,
    /// Explicit log group name
    pub group: Option<String>,
    pub extra: Map<String, Value>,
}

impl LoggingConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut section = RawSection::new("logging", raw);
        Self {
            retention_days: section.take_u32("retention_days"),
            group: section.take_string("group"),
            extra: section.into_extra(),
        }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        put(&mut map, "retention_days", self.retention_days);
        put(&mut map, "group", self.group.clone());
        merge_extra(&mut map, &self.extra);
        map
    }
}

/// Default stage for HTTP front-ends
pub const DEFAULT_API_STAGE: &str = "prod";

/// HTTP front-end settings, opaque apart from a few well-known keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiConfig {
    pub fields: Map<String, Value>,
}

impl ApiConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        Self {
            fields: raw.clone(),
        }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn stage(&self) -> &str {
        self.fields
            .get("stage")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_API_STAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logging_retention() {
        let raw = json!({"retention_days": "30", "unknown": 1});
        let logging = LoggingConfig::from_raw(raw.as_object().unwrap());
        assert_eq!(logging.retention_days, Some(30));
        assert_eq!(logging.extra["unknown"], json!(1));
    }

    #[test]
    fn test_api_is_opaque() {
        let raw = json!({"stage": "dev", "cors": {"origins": ["*"]}});
        let api = ApiConfig::from_raw(raw.as_object().unwrap());
        assert_eq!(api.stage(), "dev");
        assert_eq!(api.name(), None);
        assert_eq!(api.to_raw(), *raw.as_object().unwrap());
        assert_eq!(ApiConfig::default().stage(), DEFAULT_API_STAGE);
    }
}

//! Lenient readers over raw JSON mappings

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Shape of a raw configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Boolean,
    Map,
    List,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Map => "map",
            Self::List => "list",
        }
    }

    /// Whether `value` has this shape
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Map => value.is_object(),
            Self::List => value.is_array(),
        }
    }

    /// Describe the shape of an arbitrary value
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "map",
        }
    }
}

/// A raw section being consumed field by field.
///
/// Every `take_*` call removes the key only when its value has an accepted
/// shape; anything left over ends up in the section's `extra` mapping.
pub(crate) struct RawSection {
    section: &'static str,
    fields: Map<String, Value>,
}

impl RawSection {
    pub(crate) fn new(section: &'static str, raw: &Map<String, Value>) -> Self {
        Self {
            section,
            fields: raw.clone(),
        }
    }

    fn take_with<T>(&mut self, key: &str, read: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let parsed = read(self.fields.get(key)?);
        match parsed {
            Some(value) => {
                self.fields.remove(key);
                Some(value)
            }
            None => {
                debug!(section = self.section, field = key, "Keeping malformed field verbatim");
                None
            }
        }
    }

    pub(crate) fn take_string(&mut self, key: &str) -> Option<String> {
        self.take_with(key, |v| v.as_str().map(str::to_string))
    }

    pub(crate) fn take_u32(&mut self, key: &str) -> Option<u32> {
        self.take_with(key, as_u32)
    }

    pub(crate) fn take_bool(&mut self, key: &str) -> Option<bool> {
        self.take_with(key, |v| match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Accepts a list of strings or a single comma separated string
    pub(crate) fn take_string_list(&mut self, key: &str) -> Option<Vec<String>> {
        self.take_with(key, |v| match v {
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        })
    }

    /// Accepts a mapping whose values are primitives, stringified
    pub(crate) fn take_string_map(&mut self, key: &str) -> Option<BTreeMap<String, String>> {
        self.take_with(key, |v| {
            v.as_object()?
                .iter()
                .map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
                .collect()
        })
    }

    /// Accepts strings, numbers and booleans, stringified
    pub(crate) fn take_scalar(&mut self, key: &str) -> Option<String> {
        self.take_with(key, scalar_to_string)
    }

    /// Accepts a nested mapping and builds a typed section from it
    pub(crate) fn take_section<T>(&mut self, key: &str, build: impl FnOnce(&Map<String, Value>) -> T) -> Option<T> {
        self.take_with(key, |v| v.as_object().map(build))
    }

    /// Accepts the value as long as `parse` understands it
    pub(crate) fn take_parsed<T>(&mut self, key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        self.take_with(key, |v| v.as_str().and_then(parse))
    }

    pub(crate) fn into_extra(self) -> Map<String, Value> {
        self.fields
    }
}

pub(crate) fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Insert `value` under `key` when present
pub(crate) fn put<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

pub(crate) fn string_map_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Append the leftovers of a section.
///
/// A malformed value wins over the default of its typed field so that it
/// survives re-normalization and stays visible to the validation gate.
pub(crate) fn merge_extra(map: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        map.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section(value: Value) -> RawSection {
        RawSection::new("test", value.as_object().unwrap())
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let mut raw = section(json!({"memory": "512", "timeout": 30}));
        assert_eq!(raw.take_u32("memory"), Some(512));
        assert_eq!(raw.take_u32("timeout"), Some(30));
        assert!(raw.into_extra().is_empty());
    }

    #[test]
    fn test_malformed_values_stay_in_extra() {
        let mut raw = section(json!({"memory": "lots", "timeout": -1}));
        assert_eq!(raw.take_u32("memory"), None);
        assert_eq!(raw.take_u32("timeout"), None);

        let extra = raw.into_extra();
        assert_eq!(extra["memory"], json!("lots"));
        assert_eq!(extra["timeout"], json!(-1));
    }

    #[test]
    fn test_string_list_from_comma_separated() {
        let mut raw = section(json!({"subnets": "a, b,,c"}));
        assert_eq!(
            raw.take_string_list("subnets"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_string_map_rejects_nested_values() {
        let mut raw = section(json!({"ok": {"A": 1, "B": true}, "bad": {"A": {"x": 1}}}));
        let ok = raw.take_string_map("ok").unwrap();
        assert_eq!(ok["A"], "1");
        assert_eq!(ok["B"], "true");
        assert!(raw.take_string_map("bad").is_none());
    }

    #[test]
    fn test_describe() {
        assert_eq!(ValueKind::describe(&json!(1)), "integer");
        assert_eq!(ValueKind::describe(&json!(1.5)), "number");
        assert_eq!(ValueKind::describe(&json!({})), "map");
        assert!(ValueKind::Integer.matches(&json!(3)));
        assert!(!ValueKind::Integer.matches(&json!("3")));
    }
}

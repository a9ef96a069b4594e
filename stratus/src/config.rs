//! Configuration management
//!
//! The raw mapping is layered from an optional file, then `STRATUS__*`
//! environment variables (`__` separates nesting levels), then command-line
//! flags. File keys keep their case; environment keys arrive lowercased.

use base64::{engine::general_purpose, Engine};
use serde_json::{Map, Value};
use std::path::Path;
use stratus_sandbox::Source;

/// Read the file and environment layers into a raw mapping
pub fn load_raw(file: Option<&Path>) -> anyhow::Result<Map<String, Value>> {
    let mut builder = config::Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path));
    }

    let config = builder
        .add_source(config::Environment::with_prefix("STRATUS").separator("__"))
        .build()?;

    Ok(config.try_deserialize::<Map<String, Value>>()?)
}

/// Values given as command-line flags; set ones replace the lower layers
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub image: Option<String>,
    pub memory: Option<u32>,
    pub timeout: Option<u32>,
    pub region: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub environment: Vec<(String, String)>,
    pub asynchronous: bool,
    pub script: Option<String>,
}

impl Overrides {
    pub fn apply(&self, raw: &mut Map<String, Value>) {
        let strings = [
            (&["compute", "name"][..], &self.name),
            (&["compute", "image"][..], &self.image),
            (&["compute", "script"][..], &self.script),
            (&["region"][..], &self.region),
            (&["storage", "input_location"][..], &self.input),
            (&["storage", "output_location"][..], &self.output),
        ];
        for (path, value) in strings {
            if let Some(value) = value {
                set(raw, path, Value::String(value.clone()));
            }
        }

        if let Some(memory) = self.memory {
            set(raw, &["compute", "memory"], memory.into());
        }
        if let Some(timeout) = self.timeout {
            set(raw, &["compute", "timeout"], timeout.into());
        }
        if self.asynchronous {
            set(raw, &["compute", "invocation_mode"], "event".into());
        }
        for (key, value) in &self.environment {
            set(
                raw,
                &["compute", "environment", key.as_str()],
                Value::String(value.clone()),
            );
        }
    }
}

/// Set a nested value, replacing anything in the way that is not a mapping
fn set(raw: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = raw;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Parse a `KEY=VALUE` flag
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Script reference to put in an invocation event.
///
/// URLs and inline data pass through; local files are read and inlined so
/// the function does not need access to this machine.
pub fn script_reference(script: &str) -> anyhow::Result<String> {
    let path = match Source::parse(script) {
        Ok(Source::Remote(_)) | Ok(Source::Inline(_)) => return Ok(script.to_string()),
        Ok(Source::Local(path)) => path,
        Err(_) => Path::new(script).to_path_buf(),
    };

    let data = std::fs::read(&path)
        .map_err(|e| anyhow::anyhow!("reading script {}: {e}", path.display()))?;
    Ok(format!("base64:{}", general_purpose::STANDARD.encode(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut raw = json!({
            "compute": {"name": "from-file", "image": "alpine", "environment": {"A": "1"}},
            "storage": "not a map",
        })
        .as_object()
        .cloned()
        .unwrap();

        Overrides {
            name: Some("from-flag".into()),
            memory: Some(1024),
            input: Some("media/in".into()),
            environment: vec![("B".into(), "2".into())],
            asynchronous: true,
            ..Default::default()
        }
        .apply(&mut raw);

        assert_eq!(
            Value::Object(raw),
            json!({
                "compute": {
                    "name": "from-flag",
                    "image": "alpine",
                    "memory": 1024,
                    "invocation_mode": "event",
                    "environment": {"A": "1", "B": "2"},
                },
                "storage": {"input_location": "media/in"},
            })
        );
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut raw = Map::new();
        Overrides::default().apply(&mut raw);
        assert!(raw.is_empty());
    }

    #[test]
    fn test_load_raw_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratus.json");
        std::fs::write(
            &path,
            r#"{"compute": {"name": "blur", "memory": 2048}, "region": "eu-west-1"}"#,
        )
        .unwrap();

        let raw = load_raw(Some(path.as_path())).unwrap();
        assert_eq!(raw["region"], "eu-west-1");
        assert_eq!(raw["compute"]["name"], "blur");
    }

    #[test]
    fn test_load_raw_keeps_key_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratus.json");
        std::fs::write(
            &path,
            r#"{"compute": {"name": "Blur", "environment": {"MODE": "fast", "OUTPUT_BUCKET": "b"}}}"#,
        )
        .unwrap();

        let raw = load_raw(Some(path.as_path())).unwrap();
        assert_eq!(raw["compute"]["name"], "Blur");
        assert_eq!(
            raw["compute"]["environment"],
            json!({"MODE": "fast", "OUTPUT_BUCKET": "b"})
        );
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_script_reference() {
        assert_eq!(
            script_reference("https://example.com/s.sh").unwrap(),
            "https://example.com/s.sh"
        );
        assert_eq!(script_reference("base64:ZWNobw==").unwrap(), "base64:ZWNobw==");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sh");
        std::fs::write(&path, "echo").unwrap();
        assert_eq!(
            script_reference(path.to_str().unwrap()).unwrap(),
            "base64:ZWNobw=="
        );
        assert!(script_reference("/does/not/exist.sh").is_err());
    }
}

//! Storage section: where input arrives and where output goes

use crate::path::{normalize, StoragePath};
use crate::value::{merge_extra, RawSection};
use serde_json::{Map, Value};

/// Input and output storage locations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorageConfig {
    /// Location whose new objects trigger the function
    pub input: Option<StoragePath>,
    /// Location the function writes its results to
    pub output: Option<StoragePath>,
    pub extra: Map<String, Value>,
}

impl StorageConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut section = RawSection::new("storage", raw);

        Self {
            input: section.take_string("input_location").map(|p| normalize(&p)),
            output: section.take_string("output_location").map(|p| normalize(&p)),
            extra: section.into_extra(),
        }
    }

    /// Only the locations as written are rendered; bucket and folder are
    /// derived again on the next construction.
    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(input) = &self.input {
            map.insert("input_location".to_string(), Value::String(input.full.clone()));
        }
        if let Some(output) = &self.output {
            map.insert("output_location".to_string(), Value::String(output.full.clone()));
        }
        merge_extra(&mut map, &self.extra);
        map
    }

    /// Locations present in this section, with their field names
    pub fn locations(&self) -> impl Iterator<Item = (&'static str, &StoragePath)> {
        [
            ("storage.input_location", self.input.as_ref()),
            ("storage.output_location", self.output.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, path)| path.map(|p| (field, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locations_are_normalized() {
        let raw = json!({"input_location": "test1/in/deep", "output_location": "test1"});
        let storage = StorageConfig::from_raw(raw.as_object().unwrap());

        let input = storage.input.as_ref().unwrap();
        assert_eq!(input.bucket, "test1");
        assert_eq!(input.folder, "in/deep");

        let output = storage.output.as_ref().unwrap();
        assert_eq!(output.bucket, "test1");
        assert_eq!(output.folder_opt(), None);
        assert_eq!(output.full, "test1");

        assert_eq!(storage.locations().count(), 2);
    }

    #[test]
    fn test_render_keeps_full_path() {
        let raw = json!({"input_location": "bucket/in/"});
        let storage = StorageConfig::from_raw(raw.as_object().unwrap());
        assert_eq!(storage.to_raw()["input_location"], json!("bucket/in/"));
    }
}

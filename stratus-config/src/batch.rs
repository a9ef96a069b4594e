//! Batch section: compute environment for batch-job execution targets

use crate::value::{merge_extra, put, RawSection};
use serde_json::{Map, Value};

pub const DEFAULT_COMPUTE_TYPE: &str = "EC2";
pub const DEFAULT_DESIRED_VCPUS: u32 = 0;
pub const DEFAULT_MIN_VCPUS: u32 = 0;
pub const DEFAULT_MAX_VCPUS: u32 = 2;
pub const DEFAULT_INSTANCE_TYPE: &str = "m3.medium";

/// Batch compute environment settings
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub compute_type: String,
    pub desired_vcpus: u32,
    pub min_vcpus: u32,
    pub max_vcpus: u32,
    pub instance_types: Vec<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    /// Managed environments scale themselves
    pub managed: bool,
    pub enabled: bool,
    pub extra: Map<String, Value>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            compute_type: DEFAULT_COMPUTE_TYPE.to_string(),
            desired_vcpus: DEFAULT_DESIRED_VCPUS,
            min_vcpus: DEFAULT_MIN_VCPUS,
            max_vcpus: DEFAULT_MAX_VCPUS,
            instance_types: vec![DEFAULT_INSTANCE_TYPE.to_string()],
            subnets: Vec::new(),
            security_groups: Vec::new(),
            managed: true,
            enabled: true,
            extra: Map::new(),
        }
    }
}

fn parse_state(s: &str) -> Option<bool> {
    match s.trim().to_ascii_uppercase().as_str() {
        "ENABLED" => Some(true),
        "DISABLED" => Some(false),
        _ => None,
    }
}

impl BatchConfig {
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut section = RawSection::new("batch", raw);
        let defaults = Self::default();

        Self {
            compute_type: section
                .take_string("compute_type")
                .unwrap_or(defaults.compute_type),
            desired_vcpus: section
                .take_u32("desired_vcpus")
                .unwrap_or(defaults.desired_vcpus),
            min_vcpus: section.take_u32("min_vcpus").unwrap_or(defaults.min_vcpus),
            max_vcpus: section.take_u32("max_vcpus").unwrap_or(defaults.max_vcpus),
            instance_types: section
                .take_string_list("instance_types")
                .unwrap_or(defaults.instance_types),
            subnets: section.take_string_list("subnets").unwrap_or_default(),
            security_groups: section.take_string_list("security_groups").unwrap_or_default(),
            managed: section.take_bool("managed").unwrap_or(defaults.managed),
            enabled: section
                .take_parsed("state", parse_state)
                .unwrap_or(defaults.enabled),
            extra: section.into_extra(),
        }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        let mut map = Map::new();
        put(&mut map, "compute_type", Some(self.compute_type.clone()));
        put(&mut map, "desired_vcpus", Some(self.desired_vcpus));
        put(&mut map, "min_vcpus", Some(self.min_vcpus));
        put(&mut map, "max_vcpus", Some(self.max_vcpus));
        put(&mut map, "instance_types", Some(self.instance_types.clone()));
        put(&mut map, "subnets", Some(self.subnets.clone()));
        put(&mut map, "security_groups", Some(self.security_groups.clone()));
        put(&mut map, "managed", Some(self.managed));
        put(&mut map, "state", Some(self.state()));
        merge_extra(&mut map, &self.extra);
        map
    }

    pub fn state(&self) -> &'static str {
        if self.enabled {
            "ENABLED"
        } else {
            "DISABLED"
        }
    }

    pub fn environment_type(&self) -> &'static str {
        if self.managed {
            "MANAGED"
        } else {
            "UNMANAGED"
        }
    }
}

//! Process-wide sandbox settings
//!
//! Loaded once from `STRATUS_SANDBOX_*` environment variables when the
//! supervisor starts, then frozen.

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::PathBuf;

/// Where the container engine is fetched from by default
pub const DEFAULT_UDOCKER_URL: &str =
    "https://raw.githubusercontent.com/indigo-dc/udocker/master/udocker.py";

/// Execution mode that needs no kernel container primitives
pub const DEFAULT_EXEC_MODE: &str = "F1";

static SETTINGS: OnceCell<SandboxSettings> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Parent of every per-invocation scratch directory
    pub scratch_root: PathBuf,
    /// Location of the engine binary; any script reference form works
    pub udocker_url: String,
    pub container_name: String,
    pub exec_mode: String,
    /// File name, inside the scratch directory, the script writes its result to
    pub output_file: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            udocker_url: DEFAULT_UDOCKER_URL.to_string(),
            container_name: "stratus-sandbox".to_string(),
            exec_mode: DEFAULT_EXEC_MODE.to_string(),
            output_file: "output".to_string(),
        }
    }
}

impl SandboxSettings {
    /// Read settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("STRATUS_SANDBOX"))
            .build()?
            .try_deserialize()
    }

    /// Freeze `settings` for the rest of the process.
    ///
    /// The first call wins; later calls return the settings already installed.
    pub fn install(settings: SandboxSettings) -> &'static SandboxSettings {
        SETTINGS.get_or_init(|| settings)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SandboxSettings::default();
        assert_eq!(settings.exec_mode, "F1");
        assert_eq!(settings.output_file, "output");
        assert_eq!(settings.udocker_url, DEFAULT_UDOCKER_URL);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let settings: SandboxSettings =
            serde_json::from_str(r#"{"container_name": "job"}"#).unwrap();
        assert_eq!(settings.container_name, "job");
        assert_eq!(settings.exec_mode, DEFAULT_EXEC_MODE);
    }

    #[test]
    fn test_install_is_first_wins() {
        let first = SandboxSettings {
            container_name: "first".to_string(),
            ..Default::default()
        };
        let second = SandboxSettings {
            container_name: "second".to_string(),
            ..Default::default()
        };
        assert_eq!(SandboxSettings::install(first).container_name, "first");
        assert_eq!(SandboxSettings::install(second).container_name, "first");
    }
}

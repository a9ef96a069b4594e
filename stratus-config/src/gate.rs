//! Per-command field contracts
//!
//! Every command declares the fields it needs, in order. [`require`] checks
//! them against a configuration before the command touches any resource and
//! stops at the first failure, so error messages are reproducible.

use crate::error::ConfigError;
use crate::tree::ResourceConfig;
use crate::value::ValueKind;
use serde_json::Value;

/// A field a command reads, with its expected shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Dotted path, e.g. `compute.image`
    pub path: &'static str,
    pub kind: ValueKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(path: &'static str, kind: ValueKind) -> Self {
        Self {
            path,
            kind,
            required: true,
        }
    }

    pub const fn optional(path: &'static str, kind: ValueKind) -> Self {
        Self {
            path,
            kind,
            required: false,
        }
    }
}

const INIT_RULES: &[FieldRule] = &[
    FieldRule::required("compute.name", ValueKind::String),
    FieldRule::required("compute.image", ValueKind::String),
    FieldRule::optional("compute.memory", ValueKind::Integer),
    FieldRule::optional("compute.timeout", ValueKind::Integer),
    FieldRule::optional("compute.environment", ValueKind::Map),
    FieldRule::optional("storage.input_location", ValueKind::String),
    FieldRule::optional("storage.output_location", ValueKind::String),
    FieldRule::optional("logging.retention_days", ValueKind::Integer),
];

const RUN_RULES: &[FieldRule] = &[
    FieldRule::required("compute.name", ValueKind::String),
    FieldRule::required("compute.image", ValueKind::String),
    FieldRule::optional("compute.script", ValueKind::String),
];

const LS_RULES: &[FieldRule] = &[FieldRule::optional("region", ValueKind::String)];

const RM_RULES: &[FieldRule] = &[FieldRule::required("compute.name", ValueKind::String)];

const LOG_RULES: &[FieldRule] = &[FieldRule::required("compute.name", ValueKind::String)];

/// Commands with a field contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Init,
    Run,
    Ls,
    Rm,
    /// `rm` over every managed function; needs no name
    RmAll,
    Log,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Run => "run",
            Self::Ls => "ls",
            Self::Rm | Self::RmAll => "rm",
            Self::Log => "log",
        }
    }

    pub fn rules(&self) -> &'static [FieldRule] {
        match self {
            Self::Init => INIT_RULES,
            Self::Run => RUN_RULES,
            Self::Ls => LS_RULES,
            Self::Rm => RM_RULES,
            Self::RmAll => &[],
            Self::Log => LOG_RULES,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check `config` against the contract of `command`
pub fn require(command: CommandKind, config: &ResourceConfig) -> Result<(), ConfigError> {
    let raw = Value::Object(config.to_raw());
    command
        .rules()
        .iter()
        .try_for_each(|rule| check_rule(rule, &raw))
}

fn check_rule(rule: &FieldRule, raw: &Value) -> Result<(), ConfigError> {
    let mut current = raw;
    let mut walked = String::new();

    for key in rule.path.split('.') {
        if !current.is_object() {
            // An intermediate section that is not a mapping at all
            return Err(ConfigError::TypeMismatch {
                field: walked,
                expected: ValueKind::Map.as_str(),
                actual: ValueKind::describe(current),
            });
        }
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(key);

        match current.get(key) {
            Some(next) => current = next,
            None if rule.required => return Err(ConfigError::MissingField(rule.path.to_string())),
            None => return Ok(()),
        }
    }

    if current.is_null() && !rule.required {
        return Ok(());
    }
    if rule.kind.matches(current) {
        Ok(())
    } else {
        Err(ConfigError::TypeMismatch {
            field: rule.path.to_string(),
            expected: rule.kind.as_str(),
            actual: ValueKind::describe(current),
        })
    }
}

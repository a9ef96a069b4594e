//! Configuration model for Stratus
//!
//! Turns a loosely structured raw mapping into a normalized [`ResourceConfig`],
//! checks its cross-section invariants and enforces the per-command field
//! contracts of the validation gate.

pub mod batch;
pub mod compute;
pub mod error;
pub mod gate;
pub mod path;
pub mod sections;
pub mod storage;
pub mod tree;
mod value;

pub use batch::BatchConfig;
pub use compute::{ComputeConfig, ExecutionTarget, InvocationMode};
pub use error::ConfigError;
pub use gate::{require, CommandKind, FieldRule};
pub use path::{normalize, StoragePath};
pub use sections::{ApiConfig, IdentityConfig, LoggingConfig};
pub use storage::StorageConfig;
pub use tree::ResourceConfig;
pub use value::ValueKind;

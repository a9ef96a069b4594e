//! Command contract and provider backends for Stratus
//!
//! [`Dispatcher`] checks a configuration and hands the command to a
//! [`Provider`]. [`ServerlessProvider`] implements the contract over any
//! [`CloudApi`] client; [`LocalCloud`] is an emulated, file-backed cloud.

pub mod cloud;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod local;
pub mod serverless;

pub use cloud::CloudApi;
pub use contract::{
    DeletionResult, InvocationResult, LogLine, LogStream, Provider, ResourceHandle,
    ResourceSummary, RmTarget,
};
pub use dispatch::{Command, CommandOutput, Dispatcher};
pub use error::{CloudError, DispatchError, ProviderError};
pub use local::{FunctionExecutor, LocalCloud};
pub use serverless::ServerlessProvider;

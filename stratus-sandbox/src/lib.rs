//! Container bootstrap for Stratus functions
//!
//! [`Supervisor`] turns an [`InvocationEvent`](stratus_core::InvocationEvent)
//! into the bytes its script produced, using a user-space container engine
//! fetched at run time.

pub mod error;
pub mod fetch;
pub mod process;
pub mod settings;
pub mod supervisor;

pub use error::{ErrorResponse, SandboxError};
pub use fetch::{Fetcher, HttpFetcher, Source};
pub use process::{ProcessOutput, ProcessRunner, TokioRunner};
pub use settings::SandboxSettings;
pub use supervisor::{Supervisor, SupervisorState};

//! Core types for Stratus
//!
//! This crate provides the error taxonomy, request identifiers, the
//! invocation event format and the account/region scoped state store shared
//! by every Stratus crate.

pub mod account;
pub mod error;
pub mod event;
pub mod request_id;

pub use account::{AccountRegionKey, StateStore};
pub use error::{ErrorCode, StratusError};
pub use event::InvocationEvent;
pub use request_id::RequestId;

//! Shared types: errors and subject identifiers

pub mod error;
pub mod subject;

pub use error::{FetchError, Result, SidelineError, SubscribeError};
pub use subject::SubjectId;

//! Snapshot aggregator client
//!
//! One call in, one normalized [`Snapshot`] (or a typed [`FetchError`]) out.
//! The controller only sees the [`SnapshotSource`] trait, so tests can swap
//! the HTTP client for a scripted source.

pub mod http;

pub use http::{AggregatorConfig, HttpSnapshotSource};

use async_trait::async_trait;

use crate::snapshot::Snapshot;
use crate::types::{FetchError, SubjectId};

/// Anything that can produce a dashboard snapshot for a subject
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and normalize one subject's snapshot.
    ///
    /// No side effects beyond the call itself.
    async fn fetch(&self, subject: &SubjectId) -> Result<Snapshot, FetchError>;
}

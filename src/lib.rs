//! Sideline - live player dashboard core
//!
//! Keeps one player's consolidated dashboard snapshot fresh by refetching it
//! from an aggregation endpoint whenever a change notification arrives for
//! the player (or the player's team).
//!
//! ## Components
//!
//! - **Aggregator client**: one request in, one normalized snapshot or typed error out
//! - **Change event router**: one subscription per topic, filtered to the player
//! - **Refetch coalescer**: a burst of changes becomes one refetch
//! - **Lifecycle controller**: activation, teardown and the staleness check
//! - **Derived state store**: `{snapshot, isLoading, error, isLive}` for consumers

pub mod aggregator;
pub mod bus;
pub mod config;
pub mod live;
pub mod logging;
pub mod routes;
pub mod server;
pub mod snapshot;
pub mod types;

pub use aggregator::{HttpSnapshotSource, SnapshotSource};
pub use bus::{ChangeBus, MemoryChangeBus, NatsChangeBus};
pub use config::{Args, DashboardConfig};
pub use live::{spawn_dashboard, DashboardHandle, DashboardState};
pub use server::{run, AppState};
pub use snapshot::Snapshot;
pub use types::{FetchError, Result, SidelineError, SubjectId};

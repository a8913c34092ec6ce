//! Dashboard snapshot model
//!
//! - [`raw`]: what the aggregation endpoint sends (everything optional)
//! - [`normalize`]: raw -> normalized, filling documented defaults
//! - [`model`]: the normalized [`Snapshot`] consumers read
//! - [`views`]: narrowed stats / goals / schedule projections

pub mod model;
pub mod normalize;
pub mod raw;
pub mod views;

pub use model::{
    GoalSummary, Metrics, PlayerIdentity, RecentEvent, ScheduledEvent, Snapshot, TrackedGoal,
};
pub use normalize::{normalize, parse_timestamp, DEFAULT_EVENT_STATUS};
pub use raw::RawDashboard;
pub use views::{GoalsView, ScheduleView, StatsView};

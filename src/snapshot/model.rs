//! Normalized dashboard snapshot
//!
//! Every field here is concrete: the normalizer fills absent aggregator
//! fields with their defaults, so consumers never branch on "missing".

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Consolidated, display-ready view of one player's state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Player core attributes; `None` means the player was not found
    pub identity: Option<PlayerIdentity>,
    pub metrics: Metrics,
    /// Newest first
    pub recent_events: Vec<RecentEvent>,
    pub tracked_goals: Vec<TrackedGoal>,
    /// Soonest first
    pub upcoming_schedule: Vec<ScheduledEvent>,
    pub summary: GoalSummary,
    /// When the aggregator produced the snapshot (fetch completion if it did not say).
    /// Only `None` for the empty snapshot.
    pub as_of: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Snapshot with every field at its default
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Group (team) affiliation used to late-bind group-scoped topics
    pub fn group_id(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|i| i.team_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
    pub jersey_number: Option<u32>,
    pub position: Option<String>,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Numeric rollups, all defaulting to zero
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_shots: u64,
    pub shots_this_week: u64,
    pub sessions_completed: u64,
    pub streak_days: u64,
    /// Percentage in [0, 100]
    pub accuracy_pct: f64,
    /// Percentage in [0, 100]
    pub attendance_rate: f64,
    pub average_shot_speed: f64,
    pub wellness_score: f64,
    pub performance_score: f64,
}

/// One recent activity record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvent {
    pub date: DateTime<Utc>,
    pub magnitude: f64,
    pub label: String,
}

/// One tracked objective
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedGoal {
    pub id: String,
    pub title: String,
    /// Ratio in [0, 1]
    pub progress: f64,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
}

/// One upcoming schedule entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub event_type: Option<String>,
    /// Lower-case status, "scheduled" unless the aggregator says otherwise
    pub status: String,
}

/// Rollup over the tracked goals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    pub total_goals: u32,
    pub completed_goals: u32,
    pub in_progress_goals: u32,
    /// Mean goal progress in [0, 1]
    pub average_progress: f64,
}

impl GoalSummary {
    /// Compute the rollup from normalized goals
    pub fn from_goals(goals: &[TrackedGoal]) -> Self {
        let total = goals.len() as u32;
        let completed = goals.iter().filter(|g| g.completed).count() as u32;
        let in_progress = goals
            .iter()
            .filter(|g| !g.completed && g.progress > 0.0)
            .count() as u32;
        let average_progress = if goals.is_empty() {
            0.0
        } else {
            goals.iter().map(|g| g.progress).sum::<f64>() / goals.len() as f64
        };

        Self {
            total_goals: total,
            completed_goals: completed,
            in_progress_goals: in_progress,
            average_progress,
        }
    }
}

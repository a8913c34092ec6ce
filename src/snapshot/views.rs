//! Narrowed read-only projections of a [`Snapshot`]
//!
//! Built purely from the same snapshot; there is no separate fetch path.
//! They only narrow what a sub-view has to look at.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{GoalSummary, Metrics, RecentEvent, ScheduledEvent, Snapshot, TrackedGoal};

/// Stats-only projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub metrics: Metrics,
    pub recent_events: Vec<RecentEvent>,
    pub as_of: Option<DateTime<Utc>>,
}

/// Goals-only projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsView {
    pub tracked_goals: Vec<TrackedGoal>,
    pub summary: GoalSummary,
}

/// Schedule-only projection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub upcoming_schedule: Vec<ScheduledEvent>,
    pub team_id: Option<String>,
}

impl ScheduleView {
    /// The soonest entry that has not been cancelled
    pub fn next_event(&self) -> Option<&ScheduledEvent> {
        self.upcoming_schedule
            .iter()
            .find(|e| e.status != "cancelled")
    }
}

impl From<&Snapshot> for StatsView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            metrics: snapshot.metrics.clone(),
            recent_events: snapshot.recent_events.clone(),
            as_of: snapshot.as_of,
        }
    }
}

impl From<&Snapshot> for GoalsView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            tracked_goals: snapshot.tracked_goals.clone(),
            summary: snapshot.summary.clone(),
        }
    }
}

impl From<&Snapshot> for ScheduleView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            upcoming_schedule: snapshot.upcoming_schedule.clone(),
            team_id: snapshot.group_id().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str, status: &str, hour: u32) -> ScheduledEvent {
        ScheduledEvent {
            id: id.to_string(),
            title: id.to_string(),
            starts_at: Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap(),
            ends_at: None,
            location: None,
            event_type: None,
            status: status.to_string(),
        }
    }

    #[test]
    fn test_views_of_empty_snapshot() {
        let snapshot = Snapshot::empty();

        assert_eq!(StatsView::from(&snapshot).metrics.total_shots, 0);
        assert!(GoalsView::from(&snapshot).tracked_goals.is_empty());

        let schedule = ScheduleView::from(&snapshot);
        assert!(schedule.team_id.is_none());
        assert!(schedule.next_event().is_none());
    }

    #[test]
    fn test_next_event_skips_cancelled() {
        let snapshot = Snapshot {
            upcoming_schedule: vec![event("a", "cancelled", 9), event("b", "scheduled", 11)],
            ..Snapshot::default()
        };

        let view = ScheduleView::from(&snapshot);
        assert_eq!(view.next_event().map(|e| e.id.as_str()), Some("b"));
    }
}

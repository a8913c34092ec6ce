//! Raw aggregator payload -> normalized [`Snapshot`]
//!
//! Normalization is idempotent: a normalized snapshot converted back to
//! [`RawDashboard`] normalizes to itself.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::model::{
    GoalSummary, Metrics, PlayerIdentity, RecentEvent, ScheduledEvent, Snapshot, TrackedGoal,
};
use super::raw::{
    RawDashboard, RawGoal, RawIdentity, RawMetrics, RawRecentEvent, RawScheduledEvent, RawSummary,
};
use crate::types::SubjectId;

/// Status given to schedule entries that do not carry one
pub const DEFAULT_EVENT_STATUS: &str = "scheduled";

/// Fill every absent field with its default.
///
/// `subject` backs an identity without an id; `fetched_at` backs a missing `asOf`.
pub fn normalize(raw: RawDashboard, subject: &SubjectId, fetched_at: DateTime<Utc>) -> Snapshot {
    let identity = raw.identity.map(|i| normalize_identity(i, subject));
    let metrics = normalize_metrics(raw.metrics.unwrap_or_default());

    let mut recent_events: Vec<RecentEvent> = raw
        .recent_events
        .unwrap_or_default()
        .into_iter()
        .filter_map(normalize_recent_event)
        .collect();
    // Stable, so equal dates keep aggregator order
    recent_events.sort_by(|a, b| b.date.cmp(&a.date));

    let tracked_goals: Vec<TrackedGoal> = raw
        .tracked_goals
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, goal)| normalize_goal(goal, index))
        .collect();

    let mut upcoming_schedule: Vec<ScheduledEvent> = raw
        .upcoming_schedule
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, event)| normalize_scheduled(event, index))
        .collect();
    upcoming_schedule.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));

    let summary = normalize_summary(raw.summary, &tracked_goals);

    let as_of = raw
        .as_of
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(fetched_at);

    Snapshot {
        identity,
        metrics,
        recent_events,
        tracked_goals,
        upcoming_schedule,
        summary,
        as_of: Some(as_of),
    }
}

fn normalize_identity(raw: RawIdentity, subject: &SubjectId) -> PlayerIdentity {
    PlayerIdentity {
        id: non_blank(raw.id).unwrap_or_else(|| subject.to_string()),
        name: raw.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        jersey_number: raw
            .jersey_number
            .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n.round() as u32),
        position: non_blank(raw.position),
        team_id: non_blank(raw.team_id),
        team_name: non_blank(raw.team_name),
        photo_url: non_blank(raw.photo_url),
    }
}

fn normalize_metrics(raw: RawMetrics) -> Metrics {
    Metrics {
        total_shots: count(raw.total_shots),
        shots_this_week: count(raw.shots_this_week),
        sessions_completed: count(raw.sessions_completed),
        streak_days: count(raw.streak_days),
        accuracy_pct: percent(raw.accuracy_pct),
        attendance_rate: percent(raw.attendance_rate),
        average_shot_speed: non_negative(raw.average_shot_speed),
        wellness_score: non_negative(raw.wellness_score),
        performance_score: non_negative(raw.performance_score),
    }
}

fn normalize_recent_event(raw: RawRecentEvent) -> Option<RecentEvent> {
    let date = raw.date.as_deref().and_then(parse_timestamp)?;
    Some(RecentEvent {
        date,
        magnitude: finite_or_zero(raw.magnitude),
        label: raw.label.map(|l| l.trim().to_string()).unwrap_or_default(),
    })
}

fn normalize_goal(raw: RawGoal, index: usize) -> TrackedGoal {
    let progress = match raw.progress {
        Some(p) => ratio(Some(p)),
        None => match (raw.current_value, raw.target_value) {
            (Some(current), Some(target)) if target.is_finite() && target > 0.0 => {
                ratio(Some(current / target))
            }
            _ => 0.0,
        },
    };

    TrackedGoal {
        id: non_blank(raw.id).unwrap_or_else(|| format!("goal-{}", index)),
        title: raw.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        progress,
        completed: raw.completed.unwrap_or(progress >= 1.0),
        due_date: raw.due_date.as_deref().and_then(parse_timestamp),
    }
}

fn normalize_scheduled(raw: RawScheduledEvent, index: usize) -> Option<ScheduledEvent> {
    let starts_at = raw.starts_at.as_deref().and_then(parse_timestamp)?;
    Some(ScheduledEvent {
        id: non_blank(raw.id).unwrap_or_else(|| format!("event-{}", index)),
        title: raw.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        starts_at,
        ends_at: raw.ends_at.as_deref().and_then(parse_timestamp),
        location: non_blank(raw.location),
        event_type: non_blank(raw.event_type),
        status: non_blank(raw.status)
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| DEFAULT_EVENT_STATUS.to_string()),
    })
}

/// Reported fields win; missing ones fall back to the rollup of `goals`.
fn normalize_summary(raw: Option<RawSummary>, goals: &[TrackedGoal]) -> GoalSummary {
    let derived = GoalSummary::from_goals(goals);
    let Some(raw) = raw else {
        return derived;
    };

    GoalSummary {
        total_goals: raw
            .total_goals
            .map(small_count)
            .unwrap_or(derived.total_goals),
        completed_goals: raw
            .completed_goals
            .map(small_count)
            .unwrap_or(derived.completed_goals),
        in_progress_goals: raw
            .in_progress_goals
            .map(small_count)
            .unwrap_or(derived.in_progress_goals),
        average_progress: raw
            .average_progress
            .map(|p| ratio(Some(p)))
            .unwrap_or(derived.average_progress),
    }
}

/// Parse RFC 3339, naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` (taken as UTC) or a bare date.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn count(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}

fn small_count(value: f64) -> u32 {
    count(Some(value)).min(u64::from(u32::MAX)) as u32
}

fn non_negative(value: Option<f64>) -> f64 {
    finite_or_zero(value).max(0.0)
}

fn percent(value: Option<f64>) -> f64 {
    finite_or_zero(value).clamp(0.0, 100.0)
}

fn ratio(value: Option<f64>) -> f64 {
    finite_or_zero(value).clamp(0.0, 1.0)
}

//! Wire format returned by the aggregation endpoint
//!
//! Everything is optional. Numbers are accepted either as JSON numbers or as
//! numeric strings (Postgres `numeric` columns arrive as strings); anything
//! else is treated as absent rather than failing the whole payload.

use serde::{Deserialize, Deserializer};

use super::model::Snapshot;

/// Raw aggregator response, including the `{error}` envelope
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDashboard {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub identity: Option<RawIdentity>,
    #[serde(default)]
    pub metrics: Option<RawMetrics>,
    #[serde(default)]
    pub recent_events: Option<Vec<RawRecentEvent>>,
    #[serde(default)]
    pub tracked_goals: Option<Vec<RawGoal>>,
    #[serde(default)]
    pub upcoming_schedule: Option<Vec<RawScheduledEvent>>,
    #[serde(default)]
    pub summary: Option<RawSummary>,
    #[serde(default)]
    pub as_of: Option<String>,
}

impl RawDashboard {
    /// Error message carried by the envelope, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub jersey_number: Option<f64>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_shots: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub shots_this_week: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sessions_completed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub streak_days: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub accuracy_pct: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub attendance_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_shot_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wellness_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub performance_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecentEvent {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGoal {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub current_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScheduledEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSummary {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_goals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub completed_goals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub in_progress_goals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_progress: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    #[allow(dead_code)]
    Other(serde_json::Value),
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Express a normalized snapshot in wire form, so it can be fed back through
/// the normalizer.
impl From<&Snapshot> for RawDashboard {
    fn from(snapshot: &Snapshot) -> Self {
        let m = &snapshot.metrics;
        Self {
            error: None,
            identity: snapshot.identity.as_ref().map(|i| RawIdentity {
                id: Some(i.id.clone()),
                name: Some(i.name.clone()),
                jersey_number: i.jersey_number.map(f64::from),
                position: i.position.clone(),
                team_id: i.team_id.clone(),
                team_name: i.team_name.clone(),
                photo_url: i.photo_url.clone(),
            }),
            metrics: Some(RawMetrics {
                total_shots: Some(m.total_shots as f64),
                shots_this_week: Some(m.shots_this_week as f64),
                sessions_completed: Some(m.sessions_completed as f64),
                streak_days: Some(m.streak_days as f64),
                accuracy_pct: Some(m.accuracy_pct),
                attendance_rate: Some(m.attendance_rate),
                average_shot_speed: Some(m.average_shot_speed),
                wellness_score: Some(m.wellness_score),
                performance_score: Some(m.performance_score),
            }),
            recent_events: Some(
                snapshot
                    .recent_events
                    .iter()
                    .map(|e| RawRecentEvent {
                        date: Some(e.date.to_rfc3339()),
                        magnitude: Some(e.magnitude),
                        label: Some(e.label.clone()),
                    })
                    .collect(),
            ),
            tracked_goals: Some(
                snapshot
                    .tracked_goals
                    .iter()
                    .map(|g| RawGoal {
                        id: Some(g.id.clone()),
                        title: Some(g.title.clone()),
                        progress: Some(g.progress),
                        current_value: None,
                        target_value: None,
                        completed: Some(g.completed),
                        due_date: g.due_date.map(|d| d.to_rfc3339()),
                    })
                    .collect(),
            ),
            upcoming_schedule: Some(
                snapshot
                    .upcoming_schedule
                    .iter()
                    .map(|e| RawScheduledEvent {
                        id: Some(e.id.clone()),
                        title: Some(e.title.clone()),
                        starts_at: Some(e.starts_at.to_rfc3339()),
                        ends_at: e.ends_at.map(|d| d.to_rfc3339()),
                        location: e.location.clone(),
                        event_type: e.event_type.clone(),
                        status: Some(e.status.clone()),
                    })
                    .collect(),
            ),
            summary: Some(RawSummary {
                total_goals: Some(f64::from(snapshot.summary.total_goals)),
                completed_goals: Some(f64::from(snapshot.summary.completed_goals)),
                in_progress_goals: Some(f64::from(snapshot.summary.in_progress_goals)),
                average_progress: Some(snapshot.summary.average_progress),
            }),
            as_of: snapshot.as_of.map(|t| t.to_rfc3339()),
        }
    }
}

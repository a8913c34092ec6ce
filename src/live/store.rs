//! Derived state store
//!
//! Holds the consumer-visible [`DashboardState`] in a `watch` channel. The
//! controller owns the only [`DerivedStateStore`]; consumers get receivers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::snapshot::{GoalsView, ScheduleView, Snapshot, StatsView};
use crate::types::{FetchError, SubjectId};

/// What a consumer of the dashboard sees
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Subject this state belongs to; `None` while detached
    pub subject: Option<SubjectId>,
    /// Last accepted snapshot, or empty defaults
    pub snapshot: Snapshot,
    pub is_loading: bool,
    pub error: Option<FetchError>,
    /// At least one fetch succeeded since activation and the last one did too
    pub is_live: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn stats(&self) -> StatsView {
        StatsView::from(&self.snapshot)
    }

    pub fn goals(&self) -> GoalsView {
        GoalsView::from(&self.snapshot)
    }

    pub fn schedule(&self) -> ScheduleView {
        ScheduleView::from(&self.snapshot)
    }

    /// Renderable error message, if any
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(FetchError::user_message)
    }
}

/// Single writer of [`DashboardState`]
#[derive(Debug)]
pub struct DerivedStateStore {
    tx: watch::Sender<DashboardState>,
}

impl DerivedStateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(DashboardState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DashboardState {
        self.tx.borrow().clone()
    }

    /// Start a new activation: empty defaults, loading
    pub fn begin(&self, subject: &SubjectId) {
        self.tx.send_replace(DashboardState {
            subject: Some(subject.clone()),
            is_loading: true,
            ..Default::default()
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.tx.send_if_modified(|state| {
            if state.is_loading == loading {
                return false;
            }
            state.is_loading = loading;
            true
        });
    }

    /// Accept a successful fetch
    pub fn apply_snapshot(&self, snapshot: Snapshot, still_loading: bool) {
        self.tx.send_modify(|state| {
            state.snapshot = snapshot;
            state.error = None;
            state.is_live = true;
            state.is_loading = still_loading;
            state.updated_at = Some(Utc::now());
        });
    }

    /// Accept a failed fetch. `NotFound` also clears the snapshot.
    pub fn apply_error(&self, error: FetchError, still_loading: bool) {
        self.tx.send_modify(|state| {
            if error.clears_snapshot() {
                state.snapshot = Snapshot::empty();
            }
            state.error = Some(error);
            state.is_live = false;
            state.is_loading = still_loading;
            state.updated_at = Some(Utc::now());
        });
    }

    /// Back to the detached state
    pub fn clear(&self) {
        self.tx.send_replace(DashboardState::default());
    }
}

impl Default for DerivedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

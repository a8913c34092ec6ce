//! Shared fakes for dashboard integration tests
//!
//! - `ScriptedSource`: per-subject queue of results with virtual-time delays
//! - `RecordingBus`: in-memory bus that logs every open and close in order

#![allow(dead_code)]

use async_trait::async_trait;
use futures::Stream;
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use sideline::bus::{ChangeBus, ChangeEvent, ChangeFeed, MemoryChangeBus, TopicBinding};
use sideline::live::{spawn_dashboard, DashboardHandle};
use sideline::snapshot::{Metrics, PlayerIdentity, Snapshot};
use sideline::types::{FetchError, SubscribeError};
use sideline::{DashboardConfig, SnapshotSource, SubjectId};

// =============================================================================
// Builders
// =============================================================================

pub fn subject(id: &str) -> SubjectId {
    SubjectId::new(id).unwrap()
}

/// Snapshot with a recognisable shot count and an optional team
pub fn snapshot(player: &str, total_shots: u64, team: Option<&str>) -> Snapshot {
    Snapshot {
        identity: Some(PlayerIdentity {
            id: player.to_string(),
            name: format!("Player {}", player),
            jersey_number: None,
            position: None,
            team_id: team.map(str::to_string),
            team_name: None,
            photo_url: None,
        }),
        metrics: Metrics {
            total_shots,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn config(window_ms: u64) -> DashboardConfig {
    DashboardConfig {
        coalesce_window: Duration::from_millis(window_ms),
        ..Default::default()
    }
}

/// Let every timer and task due within the next second run (paused clock)
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

// =============================================================================
// ScriptedSource
// =============================================================================

#[derive(Clone)]
struct Scripted {
    result: Result<Snapshot, FetchError>,
    delay: Duration,
}

#[derive(Default)]
struct ScriptState {
    queued: HashMap<String, VecDeque<Scripted>>,
    fallback: HashMap<String, Scripted>,
    calls: Vec<String>,
}

/// Snapshot source answering from a script
#[derive(Default)]
pub struct ScriptedSource {
    state: Mutex<ScriptState>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one response for the next call for `player`
    pub fn respond(
        &self,
        player: &str,
        result: Result<Snapshot, FetchError>,
        delay_ms: u64,
    ) -> &Self {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(player.to_string())
            .or_default()
            .push_back(Scripted {
                result,
                delay: Duration::from_millis(delay_ms),
            });
        self
    }

    /// Response used once the queue for `player` is empty
    pub fn always(&self, player: &str, result: Result<Snapshot, FetchError>, delay_ms: u64) {
        self.state.lock().unwrap().fallback.insert(
            player.to_string(),
            Scripted {
                result,
                delay: Duration::from_millis(delay_ms),
            },
        );
    }

    /// Subjects of every call so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(&self, subject: &SubjectId) -> Result<Snapshot, FetchError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(subject.to_string());
            let queued = state
                .queued
                .get_mut(subject.as_str())
                .and_then(VecDeque::pop_front);
            queued
                .or_else(|| state.fallback.get(subject.as_str()).cloned())
                .unwrap_or(Scripted {
                    result: Ok(Snapshot::empty()),
                    delay: Duration::ZERO,
                })
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

// =============================================================================
// RecordingBus
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Open(TopicBinding),
    Close(TopicBinding),
}

/// In-memory bus that records subscription opens and closes
pub struct RecordingBus {
    inner: MemoryChangeBus,
    log: Arc<Mutex<Vec<BusOp>>>,
    rejected_topics: Mutex<HashSet<String>>,
}

impl RecordingBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryChangeBus::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            rejected_topics: Mutex::new(HashSet::new()),
        })
    }

    /// Fail every subscribe to `topic`
    pub fn reject(&self, topic: &str) {
        self.rejected_topics
            .lock()
            .unwrap()
            .insert(topic.to_string());
    }

    pub fn publish(&self, topic: &str, column: &str, value: &str) -> usize {
        self.inner.publish(topic, column, value, "{}")
    }

    /// Publish on a player-filtered topic
    pub fn player_change(&self, topic: &str, player: &str) -> usize {
        self.publish(topic, "player_id", player)
    }

    pub fn log(&self) -> Vec<BusOp> {
        self.log.lock().unwrap().clone()
    }

    /// Bindings currently open according to the log
    pub fn open_bindings(&self) -> HashSet<TopicBinding> {
        let mut open = HashSet::new();
        for op in self.log() {
            match op {
                BusOp::Open(b) => {
                    open.insert(b);
                }
                BusOp::Close(b) => {
                    open.remove(&b);
                }
            }
        }
        open
    }

    pub fn feed_count(&self) -> usize {
        self.inner.feed_count()
    }
}

#[async_trait]
impl ChangeBus for RecordingBus {
    async fn subscribe(&self, binding: &TopicBinding) -> Result<ChangeFeed, SubscribeError> {
        if self.rejected_topics.lock().unwrap().contains(&binding.topic) {
            return Err(SubscribeError::Rejected {
                topic: binding.topic.clone(),
                reason: "rejected by test".to_string(),
            });
        }

        let inner = self.inner.subscribe(binding).await?;
        self.log.lock().unwrap().push(BusOp::Open(binding.clone()));

        Ok(Box::pin(RecordedFeed {
            inner,
            binding: binding.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Logs its own close when dropped
struct RecordedFeed {
    inner: ChangeFeed,
    binding: TopicBinding,
    log: Arc<Mutex<Vec<BusOp>>>,
}

impl Stream for RecordedFeed {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for RecordedFeed {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.push(BusOp::Close(self.binding.clone()));
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub handle: DashboardHandle,
    pub task: tokio::task::JoinHandle<()>,
    pub source: Arc<ScriptedSource>,
    pub bus: Arc<RecordingBus>,
}

pub fn start(window_ms: u64) -> Harness {
    let source = ScriptedSource::new();
    let bus = RecordingBus::new();
    let (handle, task) = spawn_dashboard(
        config(window_ms),
        Arc::clone(&source) as Arc<dyn SnapshotSource>,
        Arc::clone(&bus) as Arc<dyn ChangeBus>,
    );
    Harness {
        handle,
        task,
        source,
        bus,
    }
}

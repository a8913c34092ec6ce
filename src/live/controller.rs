//! Subscription lifecycle controller
//!
//! A single task owns the subscription set, the coalescer, the fetch
//! bookkeeping and the store. Everything reaches it as a message:
//!
//! - commands from [`DashboardHandle`] (activate, deactivate, refetch, shutdown)
//! - tagged results from spawned fetch tasks
//! - change signals from the router
//! - the coalescer's burst deadline
//!
//! ## Phases
//!
//! ```text
//! Idle -> Activating(S) -> Active(S) -> Deactivating(S) -> Idle
//! ```
//!
//! `Activating -> Active` happens on the first completed fetch, success or
//! error. Any subject change passes through `Deactivating`, which closes
//! every open subscription before anything is opened for the new subject.
//!
//! ## Staleness
//!
//! Every fetch carries a [`FetchTag`]. A result is applied only if its
//! generation and subject still match the live activation and it is newer
//! than the last applied result. Anything else is dropped, logged at debug
//! and counted. Fetch tasks are never aborted.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::coalescer::RefetchCoalescer;
use super::router::ChangeEventRouter;
use super::store::{DashboardState, DerivedStateStore};
use crate::aggregator::SnapshotSource;
use crate::bus::{ChangeBus, TopicBinding};
use crate::config::DashboardConfig;
use crate::snapshot::{GoalsView, ScheduleView, Snapshot, StatsView};
use crate::types::{FetchError, Result, SidelineError, SubjectId};

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Activating(SubjectId),
    Active(SubjectId),
    Deactivating(SubjectId),
}

impl Phase {
    /// Subject of a non-idle phase
    pub fn subject(&self) -> Option<&SubjectId> {
        match self {
            Self::Idle => None,
            Self::Activating(s) | Self::Active(s) | Self::Deactivating(s) => Some(s),
        }
    }

    /// Subject whose results may still be applied
    fn accepting(&self) -> Option<&SubjectId> {
        match self {
            Self::Activating(s) | Self::Active(s) => Some(s),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Activating(_) => "activating",
            Self::Active(_) => "active",
            Self::Deactivating(_) => "deactivating",
        }
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Controller statistics
#[derive(Debug, Default)]
pub struct ControllerCounters {
    pub fetches_issued: AtomicU64,
    pub fetches_applied: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub stale_discarded: AtomicU64,
    pub change_events: AtomicU64,
    pub bursts_coalesced: AtomicU64,
    pub subscribe_failures: AtomicU64,
    pub activations: AtomicU64,
}

/// Point-in-time copy of [`ControllerCounters`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReport {
    pub fetches_issued: u64,
    pub fetches_applied: u64,
    pub fetch_errors: u64,
    pub stale_discarded: u64,
    pub change_events: u64,
    pub bursts_coalesced: u64,
    pub subscribe_failures: u64,
    pub activations: u64,
}

impl ControllerCounters {
    pub fn report(&self) -> CounterReport {
        CounterReport {
            fetches_issued: self.fetches_issued.load(Ordering::Relaxed),
            fetches_applied: self.fetches_applied.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            change_events: self.change_events.load(Ordering::Relaxed),
            bursts_coalesced: self.bursts_coalesced.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
enum Command {
    Activate(SubjectId),
    Deactivate,
    Refetch,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchReason {
    Initial,
    Manual,
    Change,
}

impl FetchReason {
    /// Whether consumers see `isLoading` for this fetch
    fn shows_loading(self) -> bool {
        matches!(self, Self::Initial | Self::Manual)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Manual => "manual",
            Self::Change => "change",
        }
    }
}

/// Identity of one issued fetch
#[derive(Debug, Clone)]
struct FetchTag {
    subject: SubjectId,
    generation: u64,
    seq: u64,
    reason: FetchReason,
}

#[derive(Debug)]
struct FetchCompletion {
    tag: FetchTag,
    result: std::result::Result<Snapshot, FetchError>,
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable consumer handle to a running dashboard controller.
///
/// The controller stops once every handle is dropped or [`shutdown`] is called.
///
/// [`shutdown`]: DashboardHandle::shutdown
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DashboardState>,
    phase: watch::Receiver<Phase>,
    counters: Arc<ControllerCounters>,
}

impl DashboardHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SidelineError::ControllerClosed)
    }

    /// Track a subject, tearing down whatever was tracked before
    pub fn activate(&self, subject: SubjectId) -> Result<()> {
        self.send(Command::Activate(subject))
    }

    /// Stop tracking. A no-op while idle.
    pub fn deactivate(&self) -> Result<()> {
        self.send(Command::Deactivate)
    }

    /// Re-fetch the current subject now. A no-op while idle.
    pub fn refetch(&self) -> Result<()> {
        self.send(Command::Refetch)
    }

    /// Tear everything down and stop the controller
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn stats(&self) -> StatsView {
        self.state.borrow().stats()
    }

    pub fn goals(&self) -> GoalsView {
        self.state.borrow().goals()
    }

    pub fn schedule(&self) -> ScheduleView {
        self.state.borrow().schedule()
    }

    pub fn phase(&self) -> Phase {
        self.phase.borrow().clone()
    }

    pub fn counters(&self) -> CounterReport {
        self.counters.report()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<DashboardState>
    where
        F: FnMut(&DashboardState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SidelineError::ControllerClosed)?;
        Ok(state.clone())
    }
}

/// Spawn a dashboard controller task
pub fn spawn_dashboard(
    config: DashboardConfig,
    source: Arc<dyn SnapshotSource>,
    bus: Arc<dyn ChangeBus>,
) -> (DashboardHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();

    let counters = Arc::new(ControllerCounters::default());
    let store = DerivedStateStore::new();
    let state = store.subscribe();
    let (phase_tx, phase) = watch::channel(Phase::Idle);

    let controller = DashboardController {
        coalescer: RefetchCoalescer::new(config.coalesce_window),
        router: ChangeEventRouter::new(bus, Arc::clone(&counters)),
        config,
        source,
        store,
        counters: Arc::clone(&counters),
        phase: Phase::Idle,
        phase_tx,
        generation: 0,
        next_seq: 0,
        last_applied_seq: 0,
        loading_until: None,
        bound_group: None,
        completions_tx,
    };

    let task = tokio::spawn(controller.run(commands_rx, completions_rx));

    let handle = DashboardHandle {
        commands: commands_tx,
        state,
        phase,
        counters,
    };

    (handle, task)
}

// ============================================================================
// Controller
// ============================================================================

struct DashboardController {
    config: DashboardConfig,
    source: Arc<dyn SnapshotSource>,
    router: ChangeEventRouter,
    coalescer: RefetchCoalescer,
    store: DerivedStateStore,
    counters: Arc<ControllerCounters>,
    phase: Phase,
    phase_tx: watch::Sender<Phase>,
    /// Bumped on every activation
    generation: u64,
    next_seq: u64,
    last_applied_seq: u64,
    /// Seq of the newest outstanding fetch that shows `isLoading`
    loading_until: Option<u64>,
    /// Group id the group topics are currently bound to
    bound_group: Option<String>,
    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
}

impl DashboardController {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<FetchCompletion>,
    ) {
        debug!(
            window_ms = self.coalescer.window().as_millis() as u64,
            "Dashboard controller started"
        );

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Activate(subject)) => self.activate(subject).await,
                    Some(Command::Deactivate) => self.teardown_all(),
                    Some(Command::Refetch) => self.refetch(),
                    Some(Command::Shutdown) | None => break,
                },

                Some(done) = completions.recv() => self.on_fetch_completed(done).await,

                Some(binding) = self.router.next_change() => self.on_change(binding),

                _ = self.coalescer.due(), if self.coalescer.is_pending() => self.flush_burst(),
            }
        }

        self.teardown_all();
        info!("Dashboard controller stopped");
    }

    async fn activate(&mut self, subject: SubjectId) {
        if self.phase.accepting() == Some(&subject) {
            debug!(subject = %subject, "Subject already active; ignoring activation");
            return;
        }

        self.teardown_all();

        self.generation += 1;
        self.next_seq = 0;
        self.last_applied_seq = 0;
        self.set_phase(Phase::Activating(subject.clone()));
        bump(&self.counters.activations);
        info!(subject = %subject, generation = self.generation, "Activating dashboard");

        self.store.begin(&subject);
        self.issue_fetch(FetchReason::Initial);

        let bindings = self.config.core_bindings(&subject);
        let opened = self.router.open_all(&bindings).await;
        debug!(
            subject = %subject,
            opened,
            requested = bindings.len(),
            "Core subscriptions opened"
        );
    }

    /// Close every subscription, drop any open burst and return to Idle.
    ///
    /// Safe to call in any phase, any number of times.
    fn teardown_all(&mut self) {
        let Some(subject) = self.phase.subject().cloned() else {
            return;
        };

        self.set_phase(Phase::Deactivating(subject.clone()));
        let closed = self.router.close_all();
        let dropped = self.coalescer.take();
        self.bound_group = None;
        self.loading_until = None;
        self.store.clear();
        self.set_phase(Phase::Idle);

        info!(
            subject = %subject,
            closed,
            dropped_signals = dropped,
            "Dashboard deactivated"
        );
    }

    fn set_phase(&mut self, phase: Phase) {
        trace!(from = self.phase.name(), to = phase.name(), "Phase transition");
        self.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    fn refetch(&mut self) {
        if self.phase.accepting().is_none() {
            debug!(phase = self.phase.name(), "Refetch requested while idle; ignoring");
            return;
        }

        // The manual fetch covers every signal received so far
        let absorbed = self.coalescer.take();
        if absorbed > 0 {
            debug!(absorbed, "Pending change burst folded into manual refetch");
        }

        self.issue_fetch(FetchReason::Manual);
    }

    fn issue_fetch(&mut self, reason: FetchReason) {
        let Some(subject) = self.phase.accepting().cloned() else {
            return;
        };

        self.next_seq += 1;
        let tag = FetchTag {
            subject,
            generation: self.generation,
            seq: self.next_seq,
            reason,
        };

        if reason.shows_loading() {
            self.loading_until = Some(tag.seq);
            self.store.set_loading(true);
        }

        bump(&self.counters.fetches_issued);
        debug!(
            subject = %tag.subject,
            generation = tag.generation,
            seq = tag.seq,
            reason = reason.as_str(),
            "Issuing dashboard fetch"
        );

        let source = Arc::clone(&self.source);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch(&tag.subject).await;
            // The controller may already be gone
            let _ = completions.send(FetchCompletion { tag, result });
        });
    }

    fn is_current(&self, tag: &FetchTag) -> bool {
        tag.generation == self.generation
            && self.phase.accepting() == Some(&tag.subject)
            && tag.seq > self.last_applied_seq
    }

    async fn on_fetch_completed(&mut self, done: FetchCompletion) {
        let FetchCompletion { tag, result } = done;

        if !self.is_current(&tag) {
            bump(&self.counters.stale_discarded);
            debug!(
                subject = %tag.subject,
                generation = tag.generation,
                seq = tag.seq,
                current_generation = self.generation,
                phase = self.phase.name(),
                "Discarding stale dashboard fetch"
            );
            return;
        }

        self.last_applied_seq = tag.seq;
        if self.loading_until.is_some_and(|s| tag.seq >= s) {
            self.loading_until = None;
        }
        let still_loading = self.loading_until.is_some();

        if matches!(self.phase, Phase::Activating(_)) {
            self.set_phase(Phase::Active(tag.subject.clone()));
            info!(subject = %tag.subject, ok = result.is_ok(), "Dashboard active");
        }

        match result {
            Ok(snapshot) => {
                let group = snapshot.group_id().map(str::to_string);
                self.bind_group_topics(group).await;
                bump(&self.counters.fetches_applied);
                trace!(subject = %tag.subject, seq = tag.seq, "Snapshot applied");
                self.store.apply_snapshot(snapshot, still_loading);
            }
            Err(error) => {
                bump(&self.counters.fetch_errors);
                warn!(
                    subject = %tag.subject,
                    seq = tag.seq,
                    reason = tag.reason.as_str(),
                    kind = error.kind(),
                    error = %error,
                    "Dashboard fetch failed"
                );
                // The cleared snapshot no longer names a group
                if error.clears_snapshot() {
                    self.bind_group_topics(None).await;
                }
                self.store.apply_error(error, still_loading);
            }
        }
    }

    /// Point the group topics at `group`, closing the old binding first
    async fn bind_group_topics(&mut self, group: Option<String>) {
        if self.bound_group == group {
            return;
        }

        if let Some(old) = self.bound_group.take() {
            for binding in self.config.group_bindings(&old) {
                self.router.close(&binding);
            }
            info!(group = %old, "Group subscriptions closed");
        }

        if let Some(new) = group {
            let bindings = self.config.group_bindings(&new);
            let opened = self.router.open_all(&bindings).await;
            info!(group = %new, opened, "Group subscriptions opened");
            self.bound_group = Some(new);
        }
    }

    fn on_change(&mut self, binding: TopicBinding) {
        bump(&self.counters.change_events);
        if self.coalescer.signal() {
            debug!(binding = %binding, "Change burst opened");
        } else {
            trace!(binding = %binding, "Change absorbed into open burst");
        }
    }

    fn flush_burst(&mut self) {
        let absorbed = self.coalescer.take();
        bump(&self.counters.bursts_coalesced);
        debug!(absorbed, "Change burst due; refetching");
        self.issue_fetch(FetchReason::Change);
    }
}

//! Live dashboard integration tests
//!
//! Drives a real controller against scripted fakes on a paused tokio clock:
//! - activation, teardown ordering and late-bound group topics
//! - staleness of in-flight results across subject changes
//! - burst coalescing
//! - error handling and the derived state rules

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{settle, snapshot, start, subject, BusOp};
use sideline::bus::TopicBinding;
use sideline::live::{DashboardState, Phase};
use sideline::FetchError;

const WINDOW_MS: u64 = 25;

fn player_binding(topic: &str, player: &str) -> TopicBinding {
    TopicBinding::new(topic, "player_id", player)
}

fn schedule_binding(team: &str) -> TopicBinding {
    TopicBinding::new("schedule", "team_id", team)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_a_default_metrics_go_live() {
    let h = start(WINDOW_MS);
    h.source.always("p-1", Ok(snapshot("p-1", 0, None)), 0);

    h.handle.activate(subject("p-1")).unwrap();
    let state = h.handle.wait_for(|s| s.is_live).await.unwrap();

    assert_eq!(state.subject, Some(subject("p-1")));
    assert_eq!(state.snapshot.metrics.total_shots, 0);
    assert!(state.error.is_none());
    assert!(!state.is_loading);
    assert_eq!(h.handle.phase(), Phase::Active(subject("p-1")));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_same_turn_events_refetch_once() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.bus.player_change("wellness-checkins", "p-1");
    h.bus.player_change("performance-records", "p-1");
    settle().await;

    assert_eq!(h.source.calls(), vec!["p-1", "p-1"]);
    let counters = h.handle.counters();
    assert_eq!(counters.change_events, 2);
    assert_eq!(counters.bursts_coalesced, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_superseded_activation_is_ignored() {
    let h = start(WINDOW_MS);
    h.source.respond("p-1", Ok(snapshot("p-1", 111, None)), 100);
    h.source.respond("p-2", Ok(snapshot("p-2", 222, None)), 10);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.activate(subject("p-2")).unwrap();
    settle().await;

    let state = h.handle.state();
    assert_eq!(state.subject, Some(subject("p-2")));
    assert!(state.is_live);
    assert_eq!(state.snapshot.metrics.total_shots, 222);

    let counters = h.handle.counters();
    assert_eq!(counters.fetches_applied, 1);
    assert_eq!(counters.stale_discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_error_envelope_keeps_snapshot() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 40, None)), 0)
        .respond(
            "p-1",
            Err(FetchError::ServerError("No dashboard data returned".into())),
            0,
        );

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.handle.refetch().unwrap();
    let state = h.handle.wait_for(|s| s.error.is_some()).await.unwrap();

    assert!(!state.is_live);
    assert_eq!(
        state.error,
        Some(FetchError::ServerError("No dashboard data returned".into()))
    );
    assert_eq!(state.snapshot.metrics.total_shots, 40);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_subject_change_closes_before_opening() {
    let h = start(WINDOW_MS);
    h.source.always("p-1", Ok(snapshot("p-1", 1, Some("t-1"))), 0);
    h.source.always("p-2", Ok(snapshot("p-2", 2, Some("t-2"))), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert!(h.bus.open_bindings().contains(&schedule_binding("t-1")));
    let p1_open: HashSet<TopicBinding> = h.bus.open_bindings();
    assert_eq!(p1_open.len(), 6);

    h.handle.activate(subject("p-2")).unwrap();
    h.handle
        .wait_for(|s| s.is_live && s.subject == Some(subject("p-2")))
        .await
        .unwrap();

    let log = h.bus.log();
    let first_p2_open = log
        .iter()
        .position(|op| {
            matches!(op, BusOp::Open(b) if b.filter_value == "p-2" || b.filter_value == "t-2")
        })
        .unwrap();

    for binding in &p1_open {
        let closed_at = log
            .iter()
            .position(|op| *op == BusOp::Close(binding.clone()))
            .unwrap_or_else(|| panic!("{} never closed", binding));
        assert!(
            closed_at < first_p2_open,
            "{} closed after the new subject started opening",
            binding
        );
    }

    let open = h.bus.open_bindings();
    assert_eq!(open.len(), 6);
    assert!(open.iter().all(|b| b.filter_value == "p-2" || b.filter_value == "t-2"));
}

#[tokio::test(start_paused = true)]
async fn test_activating_current_subject_is_noop() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.activate(subject("p-1")).unwrap();
    settle().await;

    let counters = h.handle.counters();
    assert_eq!(counters.activations, 1);
    assert_eq!(counters.fetches_issued, 1);
    assert_eq!(h.bus.feed_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_deactivate_without_activation_is_noop() {
    let h = start(WINDOW_MS);
    h.handle.deactivate().unwrap();
    h.handle.deactivate().unwrap();
    h.handle.refetch().unwrap();
    settle().await;

    assert_eq!(h.handle.phase(), Phase::Idle);
    assert_eq!(h.handle.state(), DashboardState::default());
    assert_eq!(h.source.call_count(), 0);
    assert!(h.bus.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deactivate_tears_everything_down() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 5, Some("t-1"))), 0)
        .respond("p-1", Ok(snapshot("p-1", 6, Some("t-1"))), 200);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert_eq!(h.bus.feed_count(), 6);

    // In flight when the subject detaches
    h.handle.refetch().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.handle.deactivate().unwrap();
    settle().await;

    assert_eq!(h.bus.feed_count(), 0);
    assert!(h.bus.open_bindings().is_empty());
    assert_eq!(h.handle.phase(), Phase::Idle);

    let state = h.handle.state();
    assert!(state.subject.is_none());
    assert!(!state.is_live);
    assert!(state.snapshot.is_empty());
    assert_eq!(h.handle.counters().stale_discarded, 1);

    // Late events for the old subject reach nobody
    assert_eq!(h.bus.player_change("objectives", "p-1"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_group_topic_follows_snapshot() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 1, Some("t-1"))), 0)
        .respond("p-1", Ok(snapshot("p-1", 2, Some("t-2"))), 0)
        .respond("p-1", Ok(snapshot("p-1", 3, None)), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert!(h.bus.open_bindings().contains(&schedule_binding("t-1")));

    // A schedule change for the team triggers a refetch, which moves the team
    h.bus.publish("schedule", "team_id", "t-1");
    h.handle
        .wait_for(|s| s.snapshot.metrics.total_shots == 2)
        .await
        .unwrap();

    let log = h.bus.log();
    let closed_t1 = log
        .iter()
        .position(|op| *op == BusOp::Close(schedule_binding("t-1")))
        .unwrap();
    let opened_t2 = log
        .iter()
        .position(|op| *op == BusOp::Open(schedule_binding("t-2")))
        .unwrap();
    assert!(closed_t1 < opened_t2);

    // Team disappears: group topic closed, core topics untouched
    h.handle.refetch().unwrap();
    h.handle
        .wait_for(|s| s.snapshot.metrics.total_shots == 3)
        .await
        .unwrap();

    let open = h.bus.open_bindings();
    assert_eq!(open.len(), 5);
    assert!(open.iter().all(|b| b.filter_column == "player_id"));
    assert_eq!(h.handle.schedule().team_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_closes_group_topic() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 1, Some("t-1"))), 0)
        .respond("p-1", Err(FetchError::NotFound("player p-1".into())), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert!(h.bus.open_bindings().contains(&schedule_binding("t-1")));

    h.handle.refetch().unwrap();
    h.handle.wait_for(|s| s.error.is_some()).await.unwrap();

    let open = h.bus.open_bindings();
    assert!(!open.contains(&schedule_binding("t-1")));
    assert_eq!(open.len(), 5);
    assert_eq!(h.handle.schedule().team_id, None);

    // The vanished team's topic no longer drives refetches
    h.bus.publish("schedule", "team_id", "t-1");
    settle().await;
    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_keeps_group_topic() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 1, Some("t-1"))), 0)
        .respond("p-1", Err(FetchError::ServerError("boom".into())), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.handle.refetch().unwrap();
    h.handle.wait_for(|s| s.error.is_some()).await.unwrap();

    assert!(h.bus.open_bindings().contains(&schedule_binding("t-1")));
    assert_eq!(h.handle.schedule().team_id.as_deref(), Some("t-1"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_subscriptions() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.handle.shutdown().unwrap();
    h.task.await.unwrap();

    assert_eq!(h.bus.feed_count(), 0);
    assert!(h.handle.activate(subject("p-2")).is_err());
}

// =============================================================================
// Staleness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stale_result_never_applied_for_any_delay_order() {
    for (p1_delay, p2_delay) in [(100, 10), (10, 100), (50, 50), (0, 0), (0, 30)] {
        let h = start(WINDOW_MS);
        h.source.respond("p-1", Ok(snapshot("p-1", 111, None)), p1_delay);
        h.source.respond("p-2", Ok(snapshot("p-2", 222, None)), p2_delay);

        let mut rx = h.handle.watch();
        h.handle.activate(subject("p-1")).unwrap();
        h.handle.activate(subject("p-2")).unwrap();

        // Every state published after the switch belongs to p-2
        let observer = tokio::spawn(async move {
            let mut seen_p1_data = false;
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                if state.subject == Some(subject("p-2"))
                    && state.snapshot.metrics.total_shots == 111
                {
                    seen_p1_data = true;
                }
            }
            seen_p1_data
        });

        settle().await;

        let state = h.handle.state();
        assert_eq!(
            state.snapshot.metrics.total_shots, 222,
            "delays {}/{}",
            p1_delay, p2_delay
        );
        assert_eq!(h.handle.counters().stale_discarded, 1);

        h.handle.shutdown().unwrap();
        h.task.await.unwrap();
        drop(h.handle);
        assert!(!observer.await.unwrap());
    }
}

#[tokio::test(start_paused = true)]
async fn test_older_fetch_of_same_subject_is_discarded() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 1, None)), 0)
        // manual refetch, slow
        .respond("p-1", Ok(snapshot("p-1", 5, None)), 100)
        // change-triggered refetch, fast
        .respond("p-1", Ok(snapshot("p-1", 7, None)), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.handle.refetch().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.bus.player_change("objectives", "p-1");
    settle().await;

    let state = h.handle.state();
    assert_eq!(state.snapshot.metrics.total_shots, 7);
    assert!(!state.is_loading);
    assert_eq!(h.handle.counters().stale_discarded, 1);
}

// =============================================================================
// Coalescing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_of_n_events_refetches_once() {
    for n in [2usize, 5, 50] {
        let h = start(WINDOW_MS);
        h.handle.activate(subject("p-1")).unwrap();
        h.handle.wait_for(|s| s.is_live).await.unwrap();

        let topics = [
            "raw-activity",
            "wellness-checkins",
            "objectives",
            "performance-records",
            "attendance",
        ];
        for i in 0..n {
            h.bus.player_change(topics[i % topics.len()], "p-1");
        }
        settle().await;

        let counters = h.handle.counters();
        assert_eq!(h.source.call_count(), 2, "n = {}", n);
        assert_eq!(counters.change_events, n as u64, "n = {}", n);
        assert_eq!(counters.bursts_coalesced, 1, "n = {}", n);
    }
}

#[tokio::test(start_paused = true)]
async fn test_events_spread_within_window_refetch_once() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.bus.player_change("objectives", "p-1");
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.bus.player_change("attendance", "p-1");
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.bus.player_change("raw-activity", "p-1");
    settle().await;
    assert_eq!(h.source.call_count(), 2);

    // A later event starts a new burst
    h.bus.player_change("raw-activity", "p-1");
    settle().await;
    assert_eq!(h.source.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_burst_refetch_waits_for_window() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.bus.player_change("objectives", "p-1");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.source.call_count(), 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_window_still_coalesces_queued_events() {
    let h = start(0);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    for _ in 0..10 {
        h.bus.player_change("objectives", "p-1");
    }
    settle().await;

    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_events_for_other_players_are_ignored() {
    let h = start(WINDOW_MS);
    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    h.bus.player_change("objectives", "p-9");
    h.bus.publish("objectives", "team_id", "p-1");
    settle().await;

    assert_eq!(h.source.call_count(), 1);
    assert_eq!(h.handle.counters().change_events, 0);
}

// =============================================================================
// Errors and derived state
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_not_found_clears_other_errors_preserve() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Ok(snapshot("p-1", 10, None)), 0)
        .respond("p-1", Err(FetchError::Network("refused".into())), 0)
        .respond("p-1", Err(FetchError::Timeout("15000 ms".into())), 0)
        .respond("p-1", Err(FetchError::NotFound("player p-1".into())), 0)
        .respond("p-1", Ok(snapshot("p-1", 11, None)), 0);

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    for expected_kind in ["network", "timeout"] {
        h.handle.refetch().unwrap();
        settle().await;
        let state = h.handle.state();
        assert_eq!(state.error.as_ref().map(|e| e.kind()), Some(expected_kind));
        assert!(!state.is_live);
        assert_eq!(state.snapshot.metrics.total_shots, 10);
    }

    h.handle.refetch().unwrap();
    settle().await;
    let state = h.handle.state();
    assert_eq!(state.error_message(), Some("Player not found"));
    assert!(state.snapshot.is_empty());
    assert!(!state.is_live);

    h.handle.refetch().unwrap();
    settle().await;
    let state = h.handle.state();
    assert!(state.error.is_none());
    assert!(state.is_live);
    assert_eq!(state.snapshot.metrics.total_shots, 11);
    assert_eq!(h.handle.counters().fetch_errors, 3);
}

#[tokio::test(start_paused = true)]
async fn test_initial_error_still_activates() {
    let h = start(WINDOW_MS);
    h.source
        .respond("p-1", Err(FetchError::ServerError("HTTP 500".into())), 0);

    h.handle.activate(subject("p-1")).unwrap();
    let state = h.handle.wait_for(|s| s.error.is_some()).await.unwrap();

    assert!(!state.is_live);
    assert!(!state.is_loading);
    assert_eq!(h.handle.phase(), Phase::Active(subject("p-1")));

    // Subscriptions stay open; a later change can recover
    h.bus.player_change("objectives", "p-1");
    let state = h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_loading_only_for_initial_and_manual_fetches() {
    let h = start(WINDOW_MS);
    h.source.always("p-1", Ok(snapshot("p-1", 1, None)), 100);

    h.handle.activate(subject("p-1")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.handle.state().is_loading);
    h.handle.wait_for(|s| s.is_live).await.unwrap();
    assert!(!h.handle.state().is_loading);

    // Background refetch in flight: not loading
    h.bus.player_change("objectives", "p-1");
    tokio::time::sleep(Duration::from_millis(75)).await;
    assert_eq!(h.source.call_count(), 2);
    assert!(!h.handle.state().is_loading);
    settle().await;

    // Manual refetch in flight: loading
    h.handle.refetch().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.handle.state().is_loading);
    settle().await;
    assert!(!h.handle.state().is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_is_not_fatal() {
    let h = start(WINDOW_MS);
    h.bus.reject("attendance");

    h.handle.activate(subject("p-1")).unwrap();
    h.handle.wait_for(|s| s.is_live).await.unwrap();

    assert_eq!(h.bus.feed_count(), 4);
    assert!(!h
        .bus
        .open_bindings()
        .contains(&player_binding("attendance", "p-1")));
    assert_eq!(h.handle.counters().subscribe_failures, 1);

    // Remaining topics still drive refetches
    h.bus.player_change("objectives", "p-1");
    settle().await;
    assert_eq!(h.source.call_count(), 2);

    // Retried on the next activation
    h.handle.deactivate().unwrap();
    h.handle.activate(subject("p-1")).unwrap();
    settle().await;
    assert_eq!(h.handle.counters().subscribe_failures, 2);
}

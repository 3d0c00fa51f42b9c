//! Trip draft save tests
//!
//! Direct saves with cooldown, in-flight guard and throttle backoff, the
//! offline fallback into the queue, and the debounced autosave. Timing
//! tests run on a paused clock.

use crate::common::*;
use assert_matches::assert_matches;
use planner_sync::client::offline::{ActionOutcome, DraftSave, MemoryStorage, Mutation};
use planner_sync::client::sync::{DraftAutosave, NetworkStatus};
use planner_sync::shared::error::SyncError;
use planner_sync::shared::trip::TripDraft;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn saved_drafts(api: &ScriptedApi) -> Vec<TripDraft> {
    api.calls_of(ApiOp::UpsertTripDraft)
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::UpsertTripDraft { draft, .. } => Some(draft),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_sends_only_the_latest_deferred_draft() {
    let api = ScriptedApi::new();
    let storage = MemoryStorage::new();
    let config = test_config().build().unwrap();
    let dispatcher = fixtures::dispatcher(&config, &api, &storage, NetworkStatus::Online);

    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Lisbon")).await,
        DraftSave::Saved
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Porto")).await,
        DraftSave::Deferred { retry_in } if retry_in <= Duration::from_secs(2) && retry_in > Duration::from_secs(1)
    );
    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Faro")).await,
        DraftSave::Deferred { .. }
    );
    assert_eq!(api.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(saved_drafts(&api), vec![draft("Lisbon"), draft("Faro")]);
    // the direct path never touches the queue
    assert_eq!(dispatcher.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_save_while_another_is_in_flight_is_sent_afterwards() {
    let api = ScriptedApi::new().gated();
    let storage = MemoryStorage::new();
    let dispatcher =
        fixtures::dispatcher(&no_cooldown_config(), &api, &storage, NetworkStatus::Online);

    let first = dispatcher.clone();
    let running = tokio::spawn(async move { first.save_trip_draft(TRIP, draft("Rome")).await });
    wait_for(|| api.call_count() == 1).await;

    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Milan")).await,
        DraftSave::InFlight
    );
    assert_eq!(api.call_count(), 1);

    api.open_gate(2);
    assert_matches!(running.await.unwrap(), DraftSave::Saved);
    wait_for(|| api.call_count() == 2).await;
    assert_eq!(saved_drafts(&api), vec![draft("Rome"), draft("Milan")]);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_save_backs_off_and_retries() {
    let api = ScriptedApi::new();
    api.fail_next(SyncError::remote(429, "too many requests"));
    let storage = MemoryStorage::new();
    let config = test_config().build().unwrap();
    let dispatcher = fixtures::dispatcher(&config, &api, &storage, NetworkStatus::Online);

    // first strike doubles the 3s window
    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Oslo")).await,
        DraftSave::Deferred { retry_in } if retry_in == Duration::from_secs(6)
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(saved_drafts(&api), vec![draft("Oslo"), draft("Oslo")]);
    assert!(dispatcher.monitor().is_online());
}

#[tokio::test]
async fn test_rejected_save_is_reported() {
    let api = ScriptedApi::new();
    api.fail_next(SyncError::remote(400, "ends before it starts"));
    let storage = MemoryStorage::new();
    let dispatcher =
        fixtures::dispatcher(&no_cooldown_config(), &api, &storage, NetworkStatus::Online);

    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Nowhere")).await,
        DraftSave::Failed(SyncError::Remote { status: 400, .. })
    );
    assert_eq!(dispatcher.pending_len(), 0);
}

#[tokio::test]
async fn test_network_failure_falls_back_to_the_queue() {
    let api = ScriptedApi::new();
    api.fail_next(SyncError::network("connection reset"));
    let storage = MemoryStorage::new();
    let dispatcher =
        fixtures::dispatcher(&no_cooldown_config(), &api, &storage, NetworkStatus::Online);

    let mut receipt = match dispatcher.save_trip_draft(TRIP, draft("Bergen")).await {
        DraftSave::Queued(receipt) => receipt,
        other => panic!("expected the draft to be queued, got {:?}", other),
    };
    assert_eq!(receipt.next().await, Some(ActionOutcome::Offline));
    assert!(!dispatcher.monitor().is_online());
    assert_eq!(dispatcher.metrics().draft_fallbacks, 1);

    // offline now: no request, the queued payload is replaced
    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("Tromso")).await,
        DraftSave::Queued(_)
    );
    assert_eq!(api.call_count(), 1);
    let queued = dispatcher.pending_for(TRIP);
    assert_eq!(queued.len(), 1);
    assert_eq!(
        queued[0].mutation,
        Mutation::SaveTripDraft {
            draft: draft("Tromso")
        }
    );

    dispatcher.monitor().set_online();
    let report = dispatcher.drain().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(saved_drafts(&api), vec![draft("Bergen"), draft("Tromso")]);
    assert_matches!(receipt.settled().await, Some(ActionOutcome::Succeeded(None)));
}

#[tokio::test]
async fn test_direct_save_supersedes_an_older_queued_draft() {
    let api = ScriptedApi::new();
    api.fail_next(SyncError::network("connection reset"));
    let storage = MemoryStorage::new();
    let dispatcher =
        fixtures::dispatcher(&no_cooldown_config(), &api, &storage, NetworkStatus::Online);

    let receipt = match dispatcher.save_trip_draft(TRIP, draft("OLD")).await {
        DraftSave::Queued(receipt) => receipt,
        other => panic!("expected the draft to be queued, got {:?}", other),
    };

    // the replay is rejected and stays queued
    api.fail_op(ApiOp::UpsertTripDraft, SyncError::remote(500, "boom"));
    dispatcher.monitor().set_online();
    let report = dispatcher.drain().await;
    assert_eq!(report.failed, 1);
    assert_eq!(dispatcher.pending_len(), 1);

    api.clear_failures();
    assert_matches!(
        dispatcher.save_trip_draft(TRIP, draft("NEW")).await,
        DraftSave::Saved
    );
    assert_eq!(dispatcher.pending_len(), 0);
    assert_matches!(receipt.settled().await, Some(ActionOutcome::Succeeded(None)));

    let report = dispatcher.drain().await;
    assert_eq!(report.attempted, 0);
    assert_eq!(
        saved_drafts(&api),
        vec![draft("OLD"), draft("OLD"), draft("NEW")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_autosave_debounces_rapid_edits() {
    let api = ScriptedApi::new();
    let storage = MemoryStorage::new();
    let dispatcher =
        fixtures::dispatcher(&no_cooldown_config(), &api, &storage, NetworkStatus::Online);
    let autosave = DraftAutosave::spawn(dispatcher, TRIP, Duration::from_secs(2));
    assert_eq!(autosave.trip_id(), TRIP);

    assert!(autosave.edit(draft("K")));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(autosave.edit(draft("Ky")));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(autosave.edit(draft("Kyoto")));
    assert_eq!(api.call_count(), 0);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(saved_drafts(&api), vec![draft("Kyoto")]);

    // a waiting edit is flushed on finish
    assert!(autosave.edit(draft("Kyoto & Nara")));
    autosave.finish().await;
    assert_eq!(
        saved_drafts(&api),
        vec![draft("Kyoto"), draft("Kyoto & Nara")]
    );
}

//! Builders shared by the integration tests

use crate::common::mock_api::ScriptedApi;
use planner_sync::client::offline::{Dispatcher, MemoryStorage};
use planner_sync::client::sync::{NetworkMonitor, NetworkStatus};
use planner_sync::shared::config::{SyncConfig, SyncConfigBuilder};
use planner_sync::shared::trip::TripDraft;
use std::sync::Arc;
use std::time::Duration;

pub const TRIP: &str = "trip-1";

/// Config with test-friendly paths; timings are the defaults unless changed.
pub fn test_config() -> SyncConfigBuilder {
    SyncConfig::builder().queue_path(std::env::temp_dir().join("planner-test-unused.json"))
}

/// Same as [`test_config`] but without a draft cooldown
pub fn no_cooldown_config() -> SyncConfig {
    test_config()
        .draft_cooldown(Duration::ZERO)
        .build()
        .unwrap()
}

pub fn dispatcher(
    config: &SyncConfig,
    api: &Arc<ScriptedApi>,
    storage: &MemoryStorage,
    status: NetworkStatus,
) -> Dispatcher {
    Dispatcher::new(
        config,
        api.clone(),
        Arc::new(storage.clone()),
        NetworkMonitor::new(status),
    )
}

/// Offline dispatcher with default config over fresh storage
pub fn offline_dispatcher(api: &Arc<ScriptedApi>) -> (Dispatcher, MemoryStorage) {
    let storage = MemoryStorage::new();
    let config = test_config().build().unwrap();
    let dispatcher = dispatcher(&config, api, &storage, NetworkStatus::Offline);
    (dispatcher, storage)
}

pub fn draft(destination: &str) -> TripDraft {
    TripDraft {
        destination: Some(destination.to_string()),
        ..TripDraft::default()
    }
}

/// Poll `condition` until it holds, failing after five seconds.
pub async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

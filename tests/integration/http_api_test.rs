//! REST client tests against a mock HTTP server

use assert_matches::assert_matches;
use planner_sync::client::offline::{ActionOutcome, Dispatcher, MemoryStorage, Mutation};
use planner_sync::client::sync::{NetworkMonitor, NetworkStatus};
use planner_sync::client::trip_api::{HttpTripApi, TripApi};
use planner_sync::client::Config;
use planner_sync::shared::config::SyncConfig;
use planner_sync::shared::error::SyncError;
use planner_sync::shared::trip::{ChecklistItem, Task};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRIP: &str = "trip-7";

fn client_for(server: &MockServer, timeout: Duration) -> HttpTripApi {
    let builder = SyncConfig::builder()
        .api_url(server.uri())
        .queue_path(std::env::temp_dir().join("planner-http-test.json"))
        .request_timeout(timeout);
    let mut config = Config::with_builder(builder).unwrap();
    config.set_token(Some("jwt-abc".to_string()));
    HttpTripApi::new(config).unwrap()
}

#[tokio::test]
async fn test_create_checklist_item_sends_cookie_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trips/trip-7/checklist"))
        .and(header("cookie", "token=jwt-abc"))
        .and(body_json(json!({ "text": "Sunscreen" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "abc123",
            "text": "Sunscreen",
            "checked": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    let item = api.create_checklist_item(TRIP, "Sunscreen").await.unwrap();
    assert_eq!(
        item,
        Some(ChecklistItem {
            id: "abc123".to_string(),
            text: "Sunscreen".to_string(),
            checked: false,
        })
    );
}

#[tokio::test]
async fn test_create_task_accepts_task_or_trip_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trips/trip-7/tasks"))
        .and(body_json(json!({ "description": "Book ferry" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "task-1",
            "description": "Book ferry",
            "completed": false
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // later calls answer with the whole trip
    Mock::given(method("POST"))
        .and(path("/trips/trip-7/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "trip-7",
            "destination": "Naxos",
            "tasks": []
        })))
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    let created = api.create_task(TRIP, "Book ferry").await.unwrap();
    assert_eq!(
        created,
        Some(Task {
            id: "task-1".to_string(),
            description: "Book ferry".to_string(),
            completed: false,
        })
    );
    assert_eq!(api.create_task(TRIP, "Book ferry").await.unwrap(), None);
}

#[tokio::test]
async fn test_error_status_becomes_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/trips/trip-7"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/trips/trip-7/guests/guest-2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    let throttled = api
        .upsert_trip_draft(TRIP, &Default::default())
        .await
        .unwrap_err();
    assert_eq!(throttled, SyncError::remote(429, "slow down"));
    assert!(throttled.is_throttle());

    // empty body falls back to the status text
    let missing = api.delete_guest(TRIP, "guest-2").await.unwrap_err();
    assert_matches!(missing, SyncError::Remote { status: 404, ref message } if message.contains("Not Found"));
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let builder = SyncConfig::builder()
        .api_url("http://127.0.0.1:1")
        .queue_path(std::env::temp_dir().join("planner-http-test.json"))
        .request_timeout(Duration::from_secs(2));
    let api = HttpTripApi::new(Config::with_builder(builder).unwrap()).unwrap();

    let error = api.delete_task(TRIP, "task-1").await.unwrap_err();
    assert!(error.is_network(), "unexpected error: {:?}", error);
}

#[tokio::test]
async fn test_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/trips/trip-7/tasks/task-1"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_millis(200));
    let error = api
        .set_task_completed(TRIP, "task-1", true)
        .await
        .unwrap_err();
    assert!(error.is_network(), "unexpected error: {:?}", error);
}

#[tokio::test]
async fn test_trip_draft_is_sent_camel_case() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/trips/trip-7"))
        .and(body_json(json!({
            "destination": "Reykjavik",
            "startsAt": "2026-03-01",
            "isDraft": true
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    let draft = planner_sync::shared::trip::TripDraft {
        destination: Some("Reykjavik".to_string()),
        starts_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1),
        ends_at: None,
        is_draft: true,
    };
    api.upsert_trip_draft(TRIP, &draft).await.unwrap();
}

#[tokio::test]
async fn test_guest_rename_and_delete_routes() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/trips/trip-7/guests/guest-3"))
        .and(body_json(json!({ "name": "Joana" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "guest-3",
            "name": "Joana",
            "link": "https://planner.example/invite/guest-3"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/trips/trip-7/checklist/item-4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    let guest = api
        .rename_guest(TRIP, "guest-3", "Joana")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(guest.name, "Joana");
    assert_eq!(
        guest.link.as_deref(),
        Some("https://planner.example/invite/guest-3")
    );
    api.delete_checklist_item(TRIP, "item-4").await.unwrap();
}

#[tokio::test]
async fn test_success_with_unexpected_body_is_still_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trips/trip-7/guests"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, Duration::from_secs(5));
    assert_eq!(api.create_guest(TRIP, "Ines").await.unwrap(), None);
}

#[tokio::test]
async fn test_created_add_with_unexpected_body_is_sent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trips/trip-7/checklist"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let api = Arc::new(client_for(&server, Duration::from_secs(5)));
    let config = SyncConfig::builder()
        .queue_path(std::env::temp_dir().join("planner-http-test.json"))
        .build()
        .unwrap();
    let dispatcher = Dispatcher::new(
        &config,
        api,
        Arc::new(MemoryStorage::new()),
        NetworkMonitor::new(NetworkStatus::Offline),
    );
    let receipt = dispatcher
        .submit(TRIP, Mutation::add_checklist_item("Sunscreen"))
        .receipt()
        .unwrap();

    dispatcher.monitor().set_online();
    for _ in 0..5 {
        dispatcher.drain().await;
    }

    assert_eq!(dispatcher.pending_len(), 0);
    assert_matches!(receipt.settled().await, Some(ActionOutcome::Succeeded(None)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

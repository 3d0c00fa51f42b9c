//! Trip API Client
//!
//! [`TripApi`] is the seam between the sync core and the plann.er REST API.
//! [`HttpTripApi`] is the reqwest implementation; tests substitute scripted
//! in-memory implementations.
//!
//! Every method returns `Err(SyncError::Network)` when no response arrived
//! (connect failure or timeout) and `Err(SyncError::Remote)` for a
//! non-success status. A 2xx is always a success: an answer that cannot be
//! read or decoded yields `Ok(None)`, so the request is never replayed.

use crate::client::config::Config;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::trip::{ChecklistItem, Guest, Task, TripDraft};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Remote operations the dispatcher can issue
#[async_trait]
pub trait TripApi: Send + Sync {
    /// Create a task. The API may answer with the task or with the whole
    /// trip; only a task-shaped answer is returned.
    async fn create_task(&self, trip_id: &str, description: &str) -> SyncResult<Option<Task>>;

    async fn set_task_completed(
        &self,
        trip_id: &str,
        task_id: &str,
        completed: bool,
    ) -> SyncResult<()>;

    async fn delete_task(&self, trip_id: &str, task_id: &str) -> SyncResult<()>;

    async fn create_checklist_item(
        &self,
        trip_id: &str,
        text: &str,
    ) -> SyncResult<Option<ChecklistItem>>;

    async fn set_checklist_item_checked(
        &self,
        trip_id: &str,
        item_id: &str,
        checked: bool,
    ) -> SyncResult<Option<ChecklistItem>>;

    async fn delete_checklist_item(&self, trip_id: &str, item_id: &str) -> SyncResult<()>;

    /// Invite a guest; the answer carries the share link.
    async fn create_guest(&self, trip_id: &str, name: &str) -> SyncResult<Option<Guest>>;

    async fn rename_guest(
        &self,
        trip_id: &str,
        guest_id: &str,
        name: &str,
    ) -> SyncResult<Option<Guest>>;

    async fn delete_guest(&self, trip_id: &str, guest_id: &str) -> SyncResult<()>;

    /// Upsert the editable trip header
    async fn upsert_trip_draft(&self, trip_id: &str, draft: &TripDraft) -> SyncResult<()>;
}

/// REST implementation of [`TripApi`]
#[derive(Debug, Clone)]
pub struct HttpTripApi {
    config: Config,
    client: Client,
}

impl HttpTripApi {
    /// Build a client with the configured timeout and the JWT cookie, if any.
    pub fn new(config: Config) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| SyncError::serialization(format!("invalid auth cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .timeout(config.sync().request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { config, client })
    }

    fn trip_url(&self, trip_id: &str, rest: &str) -> String {
        self.config.api_url(&format!("/trips/{}{}", trip_id, rest))
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        };
        Err(SyncError::remote(status.as_u16(), message))
    }

    /// Send and decode the answer. Once the status is 2xx the write has
    /// landed, so a body that cannot be decoded is logged and dropped.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> SyncResult<Option<T>> {
        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str(&body) {
            Ok(entity) => Ok(Some(entity)),
            Err(e) => {
                tracing::warn!(%status, error = %e, "unexpected success body, entity dropped");
                Ok(None)
            }
        }
    }

    async fn send_empty(&self, request: RequestBuilder) -> SyncResult<()> {
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl TripApi for HttpTripApi {
    async fn create_task(&self, trip_id: &str, description: &str) -> SyncResult<Option<Task>> {
        let url = self.trip_url(trip_id, "/tasks");
        let response = self
            .send(self.client.post(&url).json(&json!({ "description": description })))
            .await?;
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str::<Task>(&body).ok())
    }

    async fn set_task_completed(
        &self,
        trip_id: &str,
        task_id: &str,
        completed: bool,
    ) -> SyncResult<()> {
        let url = self.trip_url(trip_id, &format!("/tasks/{}", task_id));
        self.send_empty(self.client.patch(&url).json(&json!({ "completed": completed })))
            .await
    }

    async fn delete_task(&self, trip_id: &str, task_id: &str) -> SyncResult<()> {
        let url = self.trip_url(trip_id, &format!("/tasks/{}", task_id));
        self.send_empty(self.client.delete(&url)).await
    }

    async fn create_checklist_item(
        &self,
        trip_id: &str,
        text: &str,
    ) -> SyncResult<Option<ChecklistItem>> {
        let url = self.trip_url(trip_id, "/checklist");
        self.send_json(self.client.post(&url).json(&json!({ "text": text })))
            .await
    }

    async fn set_checklist_item_checked(
        &self,
        trip_id: &str,
        item_id: &str,
        checked: bool,
    ) -> SyncResult<Option<ChecklistItem>> {
        let url = self.trip_url(trip_id, &format!("/checklist/{}", item_id));
        self.send_json(self.client.patch(&url).json(&json!({ "checked": checked })))
            .await
    }

    async fn delete_checklist_item(&self, trip_id: &str, item_id: &str) -> SyncResult<()> {
        let url = self.trip_url(trip_id, &format!("/checklist/{}", item_id));
        self.send_empty(self.client.delete(&url)).await
    }

    async fn create_guest(&self, trip_id: &str, name: &str) -> SyncResult<Option<Guest>> {
        let url = self.trip_url(trip_id, "/guests");
        self.send_json(self.client.post(&url).json(&json!({ "name": name })))
            .await
    }

    async fn rename_guest(
        &self,
        trip_id: &str,
        guest_id: &str,
        name: &str,
    ) -> SyncResult<Option<Guest>> {
        let url = self.trip_url(trip_id, &format!("/guests/{}", guest_id));
        self.send_json(self.client.patch(&url).json(&json!({ "name": name })))
            .await
    }

    async fn delete_guest(&self, trip_id: &str, guest_id: &str) -> SyncResult<()> {
        let url = self.trip_url(trip_id, &format!("/guests/{}", guest_id));
        self.send_empty(self.client.delete(&url)).await
    }

    async fn upsert_trip_draft(&self, trip_id: &str, draft: &TripDraft) -> SyncResult<()> {
        let url = self.trip_url(trip_id, "");
        self.send_empty(self.client.put(&url).json(draft)).await
    }
}

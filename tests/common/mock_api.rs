//! Scripted in-memory trip API
//!
//! Records every call, answers with deterministic server ids, and can be
//! told to fail specific operations or to block calls behind a gate.

use async_trait::async_trait;
use planner_sync::client::trip_api::TripApi;
use planner_sync::shared::error::{SyncError, SyncResult};
use planner_sync::shared::trip::{ChecklistItem, Guest, Task, TripDraft};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Which remote operation a call was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    CreateTask,
    SetTaskCompleted,
    DeleteTask,
    CreateChecklistItem,
    SetChecklistItemChecked,
    DeleteChecklistItem,
    CreateGuest,
    RenameGuest,
    DeleteGuest,
    UpsertTripDraft,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateTask { trip_id: String, description: String },
    SetTaskCompleted { trip_id: String, task_id: String, completed: bool },
    DeleteTask { trip_id: String, task_id: String },
    CreateChecklistItem { trip_id: String, text: String },
    SetChecklistItemChecked { trip_id: String, item_id: String, checked: bool },
    DeleteChecklistItem { trip_id: String, item_id: String },
    CreateGuest { trip_id: String, name: String },
    RenameGuest { trip_id: String, guest_id: String, name: String },
    DeleteGuest { trip_id: String, guest_id: String },
    UpsertTripDraft { trip_id: String, draft: TripDraft },
}

impl ApiCall {
    pub fn op(&self) -> ApiOp {
        match self {
            Self::CreateTask { .. } => ApiOp::CreateTask,
            Self::SetTaskCompleted { .. } => ApiOp::SetTaskCompleted,
            Self::DeleteTask { .. } => ApiOp::DeleteTask,
            Self::CreateChecklistItem { .. } => ApiOp::CreateChecklistItem,
            Self::SetChecklistItemChecked { .. } => ApiOp::SetChecklistItemChecked,
            Self::DeleteChecklistItem { .. } => ApiOp::DeleteChecklistItem,
            Self::CreateGuest { .. } => ApiOp::CreateGuest,
            Self::RenameGuest { .. } => ApiOp::RenameGuest,
            Self::DeleteGuest { .. } => ApiOp::DeleteGuest,
            Self::UpsertTripDraft { .. } => ApiOp::UpsertTripDraft,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedApi {
    calls: Mutex<Vec<ApiCall>>,
    /// Consumed one per call, any operation
    fail_next: Mutex<VecDeque<SyncError>>,
    /// Every call of the operation fails
    fail_op: Mutex<HashMap<ApiOp, SyncError>>,
    checklist_id: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    next_id: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next created checklist item gets this id
    pub fn with_checklist_id(self: Arc<Self>, id: &str) -> Arc<Self> {
        *self.checklist_id.lock().unwrap() = Some(id.to_string());
        self
    }

    /// Calls block until [`ScriptedApi::open_gate`] hands out permits.
    pub fn gated(self: Arc<Self>) -> Arc<Self> {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn open_gate(&self, permits: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(permits);
        }
    }

    pub fn fail_next(&self, error: SyncError) {
        self.fail_next.lock().unwrap().push_back(error);
    }

    pub fn fail_op(&self, op: ApiOp, error: SyncError) {
        self.fail_op.lock().unwrap().insert(op, error);
    }

    pub fn clear_failures(&self) {
        self.fail_next.lock().unwrap().clear();
        self.fail_op.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: ApiOp) -> Vec<ApiCall> {
        self.calls().into_iter().filter(|call| call.op() == op).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Record, wait at the gate, then apply scripted failures.
    async fn record(&self, call: ApiCall) -> SyncResult<()> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        if let Some(error) = self.fail_next.lock().unwrap().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.fail_op.lock().unwrap().get(&op) {
            return Err(error.clone());
        }
        Ok(())
    }

    fn server_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl TripApi for ScriptedApi {
    async fn create_task(&self, trip_id: &str, description: &str) -> SyncResult<Option<Task>> {
        self.record(ApiCall::CreateTask {
            trip_id: trip_id.to_string(),
            description: description.to_string(),
        })
        .await?;
        Ok(Some(Task {
            id: self.server_id("task"),
            description: description.to_string(),
            completed: false,
        }))
    }

    async fn set_task_completed(
        &self,
        trip_id: &str,
        task_id: &str,
        completed: bool,
    ) -> SyncResult<()> {
        self.record(ApiCall::SetTaskCompleted {
            trip_id: trip_id.to_string(),
            task_id: task_id.to_string(),
            completed,
        })
        .await
    }

    async fn delete_task(&self, trip_id: &str, task_id: &str) -> SyncResult<()> {
        self.record(ApiCall::DeleteTask {
            trip_id: trip_id.to_string(),
            task_id: task_id.to_string(),
        })
        .await
    }

    async fn create_checklist_item(
        &self,
        trip_id: &str,
        text: &str,
    ) -> SyncResult<Option<ChecklistItem>> {
        self.record(ApiCall::CreateChecklistItem {
            trip_id: trip_id.to_string(),
            text: text.to_string(),
        })
        .await?;
        let fixed = self.checklist_id.lock().unwrap().take();
        Ok(Some(ChecklistItem {
            id: fixed.unwrap_or_else(|| self.server_id("item")),
            text: text.to_string(),
            checked: false,
        }))
    }

    async fn set_checklist_item_checked(
        &self,
        trip_id: &str,
        item_id: &str,
        checked: bool,
    ) -> SyncResult<Option<ChecklistItem>> {
        self.record(ApiCall::SetChecklistItemChecked {
            trip_id: trip_id.to_string(),
            item_id: item_id.to_string(),
            checked,
        })
        .await?;
        Ok(Some(ChecklistItem {
            id: item_id.to_string(),
            text: String::new(),
            checked,
        }))
    }

    async fn delete_checklist_item(&self, trip_id: &str, item_id: &str) -> SyncResult<()> {
        self.record(ApiCall::DeleteChecklistItem {
            trip_id: trip_id.to_string(),
            item_id: item_id.to_string(),
        })
        .await
    }

    async fn create_guest(&self, trip_id: &str, name: &str) -> SyncResult<Option<Guest>> {
        self.record(ApiCall::CreateGuest {
            trip_id: trip_id.to_string(),
            name: name.to_string(),
        })
        .await?;
        let id = self.server_id("guest");
        Ok(Some(Guest {
            link: Some(format!("https://planner.example/invite/{}", id)),
            id,
            name: name.to_string(),
        }))
    }

    async fn rename_guest(
        &self,
        trip_id: &str,
        guest_id: &str,
        name: &str,
    ) -> SyncResult<Option<Guest>> {
        self.record(ApiCall::RenameGuest {
            trip_id: trip_id.to_string(),
            guest_id: guest_id.to_string(),
            name: name.to_string(),
        })
        .await?;
        Ok(Some(Guest {
            id: guest_id.to_string(),
            name: name.to_string(),
            link: None,
        }))
    }

    async fn delete_guest(&self, trip_id: &str, guest_id: &str) -> SyncResult<()> {
        self.record(ApiCall::DeleteGuest {
            trip_id: trip_id.to_string(),
            guest_id: guest_id.to_string(),
        })
        .await
    }

    async fn upsert_trip_draft(&self, trip_id: &str, draft: &TripDraft) -> SyncResult<()> {
        self.record(ApiCall::UpsertTripDraft {
            trip_id: trip_id.to_string(),
            draft: draft.clone(),
        })
        .await
    }
}

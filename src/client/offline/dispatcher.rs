//! # Action Dispatcher
//!
//! Turns queued [`PendingAction`]s into [`TripApi`] calls and reports one
//! [`ActionOutcome`] per attempt.
//!
//! ## Features
//!
//! - **Single-Flight Drains**: one drain cycle at a time; a drain requested
//!   mid-cycle becomes a follow-up pass over actions not yet visited
//! - **Causal Hold**: once an action on an entity fails or is skipped, later
//!   actions on that entity wait for the next cycle
//! - **Retry Ceiling**: remote rejections count attempts, network failures
//!   do not and stop the cycle
//! - **Placeholder Remap**: confirmed adds re-point queued dependents at the
//!   server id; dependents of an abandoned add are abandoned with it
//! - **Direct Draft Saves**: guarded per trip, throttled by a cooldown that
//!   backs off on 409/429, with a trailing send of the latest payload
//!
//! ## Locking
//!
//! All mutable state sits in one `CoreState` behind a `std::sync::Mutex`.
//! The lock is only taken in short synchronous sections, never across an
//! await.

use crate::client::offline::action::{
    ActionId, ActionKind, ActionOutcome, Mutation, PendingAction, TargetType,
};
use crate::client::offline::guard::{GuardKey, InFlightGuard};
use crate::client::offline::queue::{PersistentQueue, QueueStats};
use crate::client::offline::remap::IdRemap;
use crate::client::offline::retry::{Backoff, CooldownTracker, RetryDecision, RetryPolicy};
use crate::client::offline::storage::QueueStorage;
use crate::client::sync::metrics::SyncMetrics;
use crate::client::sync::network_monitor::NetworkMonitor;
use crate::client::trip_api::TripApi;
use crate::shared::config::SyncConfig;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::trip::{RemoteEntity, TripDraft};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 256;

/// Re-check interval while another draft save for the same trip is in flight
const IN_FLIGHT_POLL: Duration = Duration::from_millis(50);

/// One outcome, as broadcast to every subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub action_id: ActionId,
    pub trip_id: String,
    pub outcome: ActionOutcome,
}

/// Result of [`Dispatcher::submit`]
#[derive(Debug)]
pub enum Submission {
    Accepted(ActionReceipt),
    /// The same add is already queued, in flight or confirmed
    Duplicate,
}

impl Submission {
    pub fn receipt(self) -> Option<ActionReceipt> {
        match self {
            Self::Accepted(receipt) => Some(receipt),
            Self::Duplicate => None,
        }
    }
}

/// Awaitable stream of outcomes for one action.
///
/// Closes after the terminal outcome. Receipts are not persisted; after a
/// restart outcomes are only visible through [`Dispatcher::subscribe`].
///
/// [`ActionReceipt::action`] is the action as queued. Applying it to an
/// [`OptimisticManager`](super::OptimisticManager) keys the snapshot by the
/// same id every [`SyncEvent`] for it carries.
#[derive(Debug)]
pub struct ActionReceipt {
    action: PendingAction,
    updates: mpsc::UnboundedReceiver<ActionOutcome>,
}

impl ActionReceipt {
    pub fn action_id(&self) -> ActionId {
        self.action.id
    }

    /// The queued action, after placeholder resolution
    pub fn action(&self) -> &PendingAction {
        &self.action
    }

    /// Next outcome, terminal or not
    pub async fn next(&mut self) -> Option<ActionOutcome> {
        self.updates.recv().await
    }

    /// Wait for success or a terminal failure.
    pub async fn settled(mut self) -> Option<ActionOutcome> {
        while let Some(outcome) = self.updates.recv().await {
            if outcome.is_terminal() {
                return Some(outcome);
            }
        }
        None
    }
}

/// Result of a direct trip draft save
#[derive(Debug)]
pub enum DraftSave {
    /// The server accepted the draft
    Saved,
    /// Inside the cooldown window; the latest draft is sent when it closes
    Deferred { retry_in: Duration },
    /// Another save for the trip is outstanding; sent after it completes
    InFlight,
    /// No connectivity; the draft was queued for replay
    Queued(ActionReceipt),
    /// The server rejected the draft
    Failed(SyncError),
}

/// Summary of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Remote calls issued
    pub attempted: usize,
    pub succeeded: usize,
    /// Rejections that left the action queued
    pub failed: usize,
    /// Actions removed after a terminal failure, orphans included
    pub abandoned: usize,
    /// Held back for causal order or a busy guard key
    pub skipped: usize,
    /// Offline at the start, or the cycle stopped on a network failure
    pub went_offline: bool,
    /// Another drain was running; this request became its follow-up pass
    pub coalesced: bool,
}

#[derive(Debug, Default)]
struct DraftSlot {
    /// Newest payload waiting for the cooldown or the in-flight save
    latest: Option<TripDraft>,
    /// A trailing sender task is alive
    trailing: bool,
}

#[derive(Debug)]
struct CoreState {
    queue: PersistentQueue,
    guard: InFlightGuard,
    cooldowns: CooldownTracker,
    drafts: HashMap<String, DraftSlot>,
    remap: IdRemap,
    listeners: HashMap<ActionId, Vec<mpsc::UnboundedSender<ActionOutcome>>>,
    metrics: SyncMetrics,
    last_drain: Option<DateTime<Utc>>,
}

impl CoreState {
    fn listen(&mut self, action: &PendingAction) -> ActionReceipt {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.entry(action.id).or_default().push(tx);
        ActionReceipt {
            action: action.clone(),
            updates: rx,
        }
    }

    fn notify(
        &mut self,
        events: &broadcast::Sender<SyncEvent>,
        action_id: ActionId,
        trip_id: &str,
        outcome: ActionOutcome,
    ) {
        if outcome.is_terminal() {
            if let Some(listeners) = self.listeners.remove(&action_id) {
                for tx in listeners {
                    let _ = tx.send(outcome.clone());
                }
            }
        } else if let Some(listeners) = self.listeners.get_mut(&action_id) {
            listeners.retain(|tx| tx.send(outcome.clone()).is_ok());
        }

        // no subscribers is fine
        let _ = events.send(SyncEvent {
            action_id,
            trip_id: trip_id.to_string(),
            outcome,
        });
    }

    fn stash_draft(&mut self, trip_id: &str, draft: TripDraft) {
        self.drafts.entry(trip_id.to_string()).or_default().latest = Some(draft);
    }
}

fn lock(core: &Mutex<CoreState>) -> MutexGuard<'_, CoreState> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a guard key; releases it when dropped, whatever path the request took.
struct InFlightPermit {
    core: Arc<Mutex<CoreState>>,
    key: GuardKey,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        lock(&self.core).guard.release(&self.key);
    }
}

/// Clears the draining flag even if a drain future is dropped mid-cycle.
struct DrainFlag<'a>(&'a AtomicBool);

impl Drop for DrainFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct DispatcherInner {
    api: Arc<dyn TripApi>,
    core: Arc<Mutex<CoreState>>,
    monitor: NetworkMonitor,
    policy: RetryPolicy,
    events: broadcast::Sender<SyncEvent>,
    draining: AtomicBool,
    rerun: AtomicBool,
}

/// Cheaply cloneable handle; clones share one queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending_len())
            .field("online", &self.inner.monitor.is_online())
            .field("draining", &self.is_draining())
            .finish()
    }
}

impl Dispatcher {
    /// Load the persisted queue and drop stale actions without reporting them.
    pub fn new(
        config: &SyncConfig,
        api: Arc<dyn TripApi>,
        storage: Arc<dyn QueueStorage>,
        monitor: NetworkMonitor,
    ) -> Self {
        let mut queue = PersistentQueue::load(storage);
        queue.cleanup_stale(config.stale_after);

        let cooldowns = CooldownTracker::new(Backoff::new(
            config.draft_cooldown,
            config.max_draft_cooldown,
        ));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tracing::info!(pending = queue.len(), "dispatcher ready");

        Self {
            inner: Arc::new(DispatcherInner {
                api,
                core: Arc::new(Mutex::new(CoreState {
                    queue,
                    guard: InFlightGuard::new(),
                    cooldowns,
                    drafts: HashMap::new(),
                    remap: IdRemap::new(config.stale_after),
                    listeners: HashMap::new(),
                    metrics: SyncMetrics::new(),
                    last_drain: None,
                })),
                monitor,
                policy: RetryPolicy::new(config.max_attempts),
                events,
                draining: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
            }),
        }
    }

    fn core(&self) -> MutexGuard<'_, CoreState> {
        lock(&self.inner.core)
    }

    fn try_permit(&self, key: &GuardKey) -> Option<InFlightPermit> {
        if !self.core().guard.try_acquire(key) {
            return None;
        }
        Some(InFlightPermit {
            core: Arc::clone(&self.inner.core),
            key: key.clone(),
        })
    }

    /// Persist a mutation intent and, when online, request a drain.
    ///
    /// Ids naming an already confirmed placeholder are resolved first. While
    /// offline the receipt immediately yields [`ActionOutcome::Offline`].
    pub fn submit(&self, trip_id: impl Into<String>, mut mutation: Mutation) -> Submission {
        let trip_id = trip_id.into();
        let online = self.inner.monitor.is_online();

        let receipt = {
            let mut core = self.core();
            if core.remap.apply(&mut mutation) {
                tracing::debug!(%trip_id, "resolved placeholder id at submit");
            }
            let action = PendingAction::new(trip_id.clone(), mutation);

            if action.kind() == ActionKind::Add {
                let placeholder = action.entity_ref();
                if core.guard.is_held(&action.guard_key())
                    || core.queue.has_pending_add(&trip_id, placeholder)
                    || core.remap.resolve(placeholder).is_some()
                {
                    tracing::debug!(%trip_id, placeholder, "duplicate add ignored");
                    return Submission::Duplicate;
                }
            }

            let action_id = action.id;
            tracing::debug!(
                %action_id,
                %trip_id,
                kind = ?action.kind(),
                target = ?action.target(),
                "action queued"
            );
            let receipt = core.listen(&action);
            core.queue.push(action);

            if !online {
                core.metrics.record_deferred();
                core.notify(&self.inner.events, action_id, &trip_id, ActionOutcome::Offline);
            }
            receipt
        };

        if online {
            self.request_drain();
        }
        Submission::Accepted(receipt)
    }

    /// Spawn a drain on the current runtime when online. Coalesces with a
    /// running one.
    pub fn request_drain(&self) {
        if !self.inner.monitor.is_online() {
            return;
        }
        if self.inner.draining.load(Ordering::SeqCst) {
            self.inner.rerun.store(true, Ordering::SeqCst);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    this.drain().await;
                });
            }
            Err(_) => tracing::debug!("no runtime, drain left to the scheduler"),
        }
    }

    /// Run one drain cycle over the queue in `enqueued_at` order.
    ///
    /// Nothing is dispatched while the monitor reports offline; the report
    /// then only carries `went_offline`.
    pub async fn drain(&self) -> DrainReport {
        if !self.inner.monitor.is_online() {
            tracing::debug!(pending = self.pending_len(), "offline, drain skipped");
            return DrainReport {
                went_offline: true,
                ..DrainReport::default()
            };
        }
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.inner.rerun.store(true, Ordering::SeqCst);
            return DrainReport {
                coalesced: true,
                ..DrainReport::default()
            };
        }

        let started = Instant::now();
        let mut report = DrainReport::default();
        {
            let _flag = DrainFlag(&self.inner.draining);
            let mut visited = HashSet::new();
            let mut held = HashSet::new();

            loop {
                self.inner.rerun.store(false, Ordering::SeqCst);
                self.drain_pass(&mut visited, &mut held, &mut report).await;
                if report.went_offline || !self.inner.rerun.load(Ordering::SeqCst) {
                    break;
                }
                tracing::debug!("follow-up drain pass");
            }

            let mut core = self.core();
            core.metrics.record_drain(started.elapsed());
            core.last_drain = Some(Utc::now());
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            abandoned = report.abandoned,
            skipped = report.skipped,
            offline = report.went_offline,
            "drain finished"
        );

        // a request that raced the flag reset gets its own cycle
        if !report.went_offline && self.inner.rerun.swap(false, Ordering::SeqCst) {
            self.request_drain();
        }
        report
    }

    async fn drain_pass(
        &self,
        visited: &mut HashSet<ActionId>,
        held: &mut HashSet<(String, String)>,
        report: &mut DrainReport,
    ) {
        let snapshot = self.core().queue.snapshot();

        for queued in snapshot {
            if !self.inner.monitor.is_online() {
                tracing::debug!("went offline mid-cycle, drain stopped");
                report.went_offline = true;
                break;
            }
            if !visited.insert(queued.id) {
                continue;
            }
            // re-read: it may have been retargeted or removed since the snapshot
            let current = self.core().queue.get(&queued.id).cloned();
            let Some(action) = current else {
                continue;
            };

            let entity = (action.trip_id.clone(), action.entity_ref().to_string());
            if held.contains(&entity) {
                tracing::debug!(action_id = %action.id, "held behind an earlier action");
                report.skipped += 1;
                continue;
            }

            if let Some(placeholder) = action.depends_on_placeholder() {
                let add_queued = self.core().queue.has_pending_add(&action.trip_id, placeholder);
                if add_queued {
                    held.insert(entity);
                    report.skipped += 1;
                } else {
                    self.abandon_orphan(&action);
                    report.abandoned += 1;
                }
                continue;
            }

            let Some(permit) = self.try_permit(&action.guard_key()) else {
                tracing::debug!(action_id = %action.id, "guard key busy, skipped");
                held.insert(entity);
                report.skipped += 1;
                continue;
            };

            tracing::debug!(
                action_id = %action.id,
                trip_id = %action.trip_id,
                kind = ?action.kind(),
                target = ?action.target(),
                attempts = action.attempts,
                "dispatching"
            );
            report.attempted += 1;
            let result = self.execute(&action).await;

            match result {
                Ok(server) => {
                    self.inner.monitor.set_online();
                    self.on_success(&action, server);
                    report.succeeded += 1;
                }
                Err(error) if error.is_network() => {
                    self.on_network_failure(&action, &error);
                    report.went_offline = true;
                    break;
                }
                Err(error) => {
                    self.inner.monitor.set_online();
                    match self.on_remote_failure(&action, error) {
                        0 => report.failed += 1,
                        abandoned => report.abandoned += abandoned,
                    }
                    held.insert(entity);
                }
            }
            drop(permit);
        }
    }

    async fn execute(&self, action: &PendingAction) -> SyncResult<Option<RemoteEntity>> {
        let api = &self.inner.api;
        let trip_id = action.trip_id.as_str();

        match &action.mutation {
            Mutation::AddTask { description, .. } => Ok(api
                .create_task(trip_id, description)
                .await?
                .map(RemoteEntity::Task)),
            Mutation::SetTaskCompleted { task_id, completed } => {
                api.set_task_completed(trip_id, task_id, *completed).await?;
                Ok(None)
            }
            Mutation::DeleteTask { task_id } => {
                api.delete_task(trip_id, task_id).await?;
                Ok(None)
            }
            Mutation::AddChecklistItem { text, .. } => Ok(api
                .create_checklist_item(trip_id, text)
                .await?
                .map(RemoteEntity::ChecklistItem)),
            Mutation::SetChecklistItemChecked { item_id, checked } => Ok(api
                .set_checklist_item_checked(trip_id, item_id, *checked)
                .await?
                .map(RemoteEntity::ChecklistItem)),
            Mutation::DeleteChecklistItem { item_id } => {
                api.delete_checklist_item(trip_id, item_id).await?;
                Ok(None)
            }
            Mutation::AddGuest { name, .. } => Ok(api
                .create_guest(trip_id, name)
                .await?
                .map(RemoteEntity::Guest)),
            Mutation::RenameGuest { guest_id, name } => Ok(api
                .rename_guest(trip_id, guest_id, name)
                .await?
                .map(RemoteEntity::Guest)),
            Mutation::DeleteGuest { guest_id } => {
                api.delete_guest(trip_id, guest_id).await?;
                Ok(None)
            }
            Mutation::SaveTripDraft { draft } => {
                api.upsert_trip_draft(trip_id, draft).await?;
                Ok(None)
            }
        }
    }

    fn on_success(&self, action: &PendingAction, server: Option<RemoteEntity>) {
        let mut core = self.core();
        core.queue.remove(&action.id);

        if let Some(placeholder) = action.mutation.placeholder_id() {
            match &server {
                Some(entity) => {
                    core.remap.record(placeholder, entity.id(), Instant::now());
                    let retargeted = core.queue.retarget(&action.trip_id, placeholder, entity.id());
                    tracing::debug!(
                        placeholder,
                        server_id = entity.id(),
                        retargeted,
                        "placeholder resolved"
                    );
                }
                None => tracing::warn!(
                    action_id = %action.id,
                    placeholder,
                    "add confirmed without an id; dependents cannot be resolved"
                ),
            }
        }
        if action.target() == TargetType::TripDraft {
            core.cooldowns.record_success(&action.trip_id);
        }

        core.metrics.record_success();
        core.notify(
            &self.inner.events,
            action.id,
            &action.trip_id,
            ActionOutcome::Succeeded(server),
        );
    }

    fn on_network_failure(&self, action: &PendingAction, error: &SyncError) {
        tracing::warn!(action_id = %action.id, %error, "no connectivity, drain stopped");
        self.inner.monitor.set_offline();

        let mut core = self.core();
        core.queue
            .update(&action.id, |a| a.last_error = Some(error.to_string()));
        core.metrics.record_deferred();
        core.notify(
            &self.inner.events,
            action.id,
            &action.trip_id,
            ActionOutcome::Offline,
        );
    }

    /// Number of actions abandoned: zero while retries remain, otherwise the
    /// action plus any orphaned dependents.
    fn on_remote_failure(&self, action: &PendingAction, error: SyncError) -> usize {
        let mut core = self.core();
        let previous = core
            .queue
            .get(&action.id)
            .map_or(action.attempts, |a| a.attempts);

        if action.target() == TargetType::TripDraft && error.is_throttle() {
            core.cooldowns.record_throttled(&action.trip_id);
        }

        match self.inner.policy.on_failure(previous) {
            RetryDecision::Retry { attempts } => {
                let message = error.to_string();
                core.queue.update(&action.id, |a| {
                    a.attempts = attempts;
                    a.last_error = Some(message);
                });
                core.metrics.record_failure(false);
                tracing::warn!(action_id = %action.id, attempts, %error, "action rejected, will retry");
                core.notify(
                    &self.inner.events,
                    action.id,
                    &action.trip_id,
                    ActionOutcome::Failed {
                        error,
                        attempts,
                        terminal: false,
                    },
                );
                0
            }
            RetryDecision::Abandon { attempts } => {
                core.queue.remove(&action.id);
                core.metrics.record_failure(true);
                tracing::error!(action_id = %action.id, attempts, %error, "action abandoned");
                core.notify(
                    &self.inner.events,
                    action.id,
                    &action.trip_id,
                    ActionOutcome::Failed {
                        error,
                        attempts,
                        terminal: true,
                    },
                );

                let mut abandoned = 1;
                if let Some(placeholder) = action.mutation.placeholder_id() {
                    let orphans = core.queue.remove_where(|a| {
                        a.trip_id == action.trip_id && a.depends_on_placeholder() == Some(placeholder)
                    });
                    abandoned += orphans.len();
                    for orphan in orphans {
                        tracing::error!(action_id = %orphan.id, placeholder, "dependent action abandoned");
                        core.metrics.record_orphaned();
                        core.notify(
                            &self.inner.events,
                            orphan.id,
                            &orphan.trip_id,
                            orphaned(&orphan, placeholder),
                        );
                    }
                }
                abandoned
            }
        }
    }

    /// A queued action names a placeholder whose add is gone.
    fn abandon_orphan(&self, action: &PendingAction) {
        let placeholder = action.entity_ref();
        tracing::error!(action_id = %action.id, placeholder, "orphaned action abandoned");

        let mut core = self.core();
        core.queue.remove(&action.id);
        core.metrics.record_orphaned();
        core.notify(
            &self.inner.events,
            action.id,
            &action.trip_id,
            orphaned(action, placeholder),
        );
    }

    /// Save a trip draft through the direct path.
    ///
    /// Offline, or on a network failure, the draft is queued instead. Inside
    /// the cooldown window or while another save for the trip is outstanding
    /// the draft is kept and sent once by a trailing task; later calls
    /// replace the kept payload. A successful save settles any draft still
    /// queued for the trip, which is older by construction.
    pub async fn save_trip_draft(&self, trip_id: &str, draft: TripDraft) -> DraftSave {
        let outcome = self.send_draft(trip_id, draft).await;
        if matches!(outcome, DraftSave::Deferred { .. } | DraftSave::InFlight) {
            self.ensure_trailing(trip_id);
        }
        outcome
    }

    async fn send_draft(&self, trip_id: &str, draft: TripDraft) -> DraftSave {
        if !self.inner.monitor.is_online() {
            tracing::debug!(%trip_id, "offline, draft queued without a request");
            return DraftSave::Queued(self.queue_draft(trip_id, draft));
        }

        let key = GuardKey::trip_draft(trip_id);
        {
            let mut core = self.core();
            let now = Instant::now();
            if let Some(retry_in) = core.cooldowns.remaining(trip_id, now) {
                core.stash_draft(trip_id, draft);
                tracing::debug!(%trip_id, ?retry_in, "draft save deferred by cooldown");
                return DraftSave::Deferred { retry_in };
            }
            if !core.guard.try_acquire(&key) {
                core.stash_draft(trip_id, draft);
                return DraftSave::InFlight;
            }
            core.cooldowns.record_request(trip_id, now);
            // this payload is newer than anything kept
            if let Some(slot) = core.drafts.get_mut(trip_id) {
                slot.latest = None;
            }
        }
        let permit = InFlightPermit {
            core: Arc::clone(&self.inner.core),
            key,
        };

        let result = self.inner.api.upsert_trip_draft(trip_id, &draft).await;

        match result {
            Ok(()) => {
                self.inner.monitor.set_online();
                let mut core = self.core();
                core.cooldowns.record_success(trip_id);
                core.metrics.record_success();
                // the permit is still held, so no queued draft is in flight
                let superseded = core.queue.remove_where(|a| {
                    a.trip_id == trip_id && a.target() == TargetType::TripDraft
                });
                for stale in superseded {
                    tracing::debug!(action_id = %stale.id, %trip_id, "queued draft superseded");
                    core.notify(
                        &self.inner.events,
                        stale.id,
                        trip_id,
                        ActionOutcome::Succeeded(None),
                    );
                }
                drop(core);
                drop(permit);
                tracing::debug!(%trip_id, "trip draft saved");
                DraftSave::Saved
            }
            Err(error) if error.is_network() => {
                drop(permit);
                tracing::warn!(%trip_id, %error, "draft save failed, queued for replay");
                self.inner.monitor.set_offline();
                DraftSave::Queued(self.queue_draft(trip_id, draft))
            }
            Err(error) if error.is_throttle() => {
                drop(permit);
                let mut core = self.core();
                let retry_in = core.cooldowns.record_throttled(trip_id);
                core.stash_draft(trip_id, draft);
                tracing::warn!(%trip_id, ?retry_in, %error, "draft save throttled");
                DraftSave::Deferred { retry_in }
            }
            Err(error) => {
                drop(permit);
                self.core().metrics.record_failure(false);
                tracing::warn!(%trip_id, %error, "draft save rejected");
                DraftSave::Failed(error)
            }
        }
    }

    /// Queue a draft save, replacing the payload of one already queued for
    /// the trip unless that one is being sent right now.
    fn queue_draft(&self, trip_id: &str, draft: TripDraft) -> ActionReceipt {
        let mut core = self.core();
        core.metrics.record_draft_fallback();

        let busy = core.guard.is_held(&GuardKey::trip_draft(trip_id));
        let existing = core
            .queue
            .for_trip(trip_id)
            .into_iter()
            .find(|a| a.target() == TargetType::TripDraft)
            .map(|a| a.id)
            .filter(|_| !busy);

        let replaced = existing.and_then(|id| {
            core.queue
                .update(&id, |a| a.mutation = Mutation::SaveTripDraft { draft: draft.clone() });
            core.queue.get(&id).cloned()
        });
        let action = match replaced {
            Some(action) => action,
            None => {
                let action = PendingAction::new(trip_id, Mutation::SaveTripDraft { draft });
                core.queue.push(action.clone());
                action
            }
        };

        let action_id = action.id;
        let receipt = core.listen(&action);
        core.metrics.record_deferred();
        core.notify(&self.inner.events, action_id, trip_id, ActionOutcome::Offline);
        receipt
    }

    fn ensure_trailing(&self, trip_id: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        {
            let mut core = self.core();
            let slot = core.drafts.entry(trip_id.to_string()).or_default();
            if slot.trailing {
                return;
            }
            slot.trailing = true;
        }

        let this = self.clone();
        let trip_id = trip_id.to_string();
        handle.spawn(async move {
            this.run_trailing(&trip_id).await;
        });
    }

    /// Send kept drafts for `trip_id` until none is left.
    async fn run_trailing(&self, trip_id: &str) {
        loop {
            let wait = {
                let mut core = self.core();
                let pending = core
                    .drafts
                    .get(trip_id)
                    .is_some_and(|slot| slot.latest.is_some());
                if !pending {
                    core.drafts.remove(trip_id);
                    return;
                }
                core.cooldowns.remaining(trip_id, Instant::now())
            };
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
                continue;
            }

            let next = {
                let mut core = self.core();
                core.drafts
                    .get_mut(trip_id)
                    .and_then(|slot| slot.latest.take())
            };
            let Some(draft) = next else {
                continue;
            };

            tracing::debug!(%trip_id, "sending deferred trip draft");
            if let DraftSave::InFlight = self.send_draft(trip_id, draft).await {
                tokio::time::sleep(IN_FLIGHT_POLL).await;
            }
        }
    }

    /// Actions waiting in the queue
    pub fn pending_len(&self) -> usize {
        self.core().queue.len()
    }

    /// Queued actions of one trip, oldest first
    pub fn pending_for(&self, trip_id: &str) -> Vec<PendingAction> {
        self.core().queue.for_trip(trip_id)
    }

    /// Whether anything queued still touches the entity; drives "pending"
    /// indicators.
    pub fn is_pending(&self, trip_id: &str, entity_id: &str) -> bool {
        self.core().queue.touches(trip_id, entity_id)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.core().queue.stats()
    }

    /// Server id a placeholder resolved to, if its add was confirmed.
    pub fn resolve_placeholder(&self, placeholder_id: &str) -> Option<String> {
        self.core().remap.resolve(placeholder_id).map(str::to_string)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    pub fn last_drain(&self) -> Option<DateTime<Utc>> {
        self.core().last_drain
    }

    pub fn metrics(&self) -> SyncMetrics {
        self.core().metrics.clone()
    }

    /// Every outcome of every action, including replays after a restart
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.inner.monitor
    }
}

fn orphaned(action: &PendingAction, placeholder: &str) -> ActionOutcome {
    ActionOutcome::Failed {
        error: SyncError::orphaned(format!("add for {} was abandoned", placeholder)),
        attempts: action.attempts,
        terminal: true,
    }
}

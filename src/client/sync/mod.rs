//! # Background Sync Service
//!
//! Host-managed lifecycle around the [`Dispatcher`]: a background task that
//! drains the pending-action queue when connectivity returns and on a
//! periodic timer.
//!
//! ## Architecture
//!
//! The sync service coordinates:
//! - **Dispatcher**: queue replay and direct draft saves
//! - **Scheduler**: periodic drain timer
//! - **Network Monitor**: connectivity and online edges
//! - **Sync State**: status snapshots for indicators
//! - **Metrics**: cumulative outcome counters
//! - **Autosave**: debounced trip draft saves
//!
//! ## Key Features
//!
//! - **Replay on Start**: whatever survived a restart is drained right away
//!   when online
//! - **Edge Triggering**: every offline to online transition starts a drain
//! - **Periodic Drains**: every tick drains while online and anything is
//!   queued; the host drives the monitor back online
//! - **Event Stream**: every outcome is broadcast to subscribers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use planner_sync::client::offline::{FileStorage, Mutation};
//! use planner_sync::client::sync::SyncService;
//! use planner_sync::client::trip_api::HttpTripApi;
//! use planner_sync::client::Config;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let storage = Arc::new(FileStorage::new(config.sync().queue_path.clone()));
//! let api = Arc::new(HttpTripApi::new(config.clone())?);
//!
//! let mut service = SyncService::new(config.sync().clone(), api, storage);
//! service.start()?;
//!
//! service
//!     .dispatcher()
//!     .submit("trip-1", Mutation::add_checklist_item("Sunscreen"));
//!
//! let status = service.status();
//! println!("pending: {}", status.pending_actions);
//! # Ok(())
//! # }
//! ```

pub mod autosave;
pub mod metrics;
pub mod network_monitor;
pub mod scheduler;
pub mod sync_state;

pub use autosave::DraftAutosave;
pub use metrics::SyncMetrics;
pub use network_monitor::{NetworkMonitor, NetworkStatus};
pub use scheduler::DrainScheduler;
pub use sync_state::SyncStatus;

use crate::client::offline::dispatcher::{Dispatcher, DrainReport, SyncEvent};
use crate::client::offline::storage::QueueStorage;
use crate::client::trip_api::TripApi;
use crate::shared::config::SyncConfig;
use crate::shared::error::ServiceError;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Main sync service coordinator
#[derive(Debug)]
pub struct SyncService {
    /// Service configuration
    config: SyncConfig,
    dispatcher: Dispatcher,
    scheduler: DrainScheduler,
    /// Background sync task handle
    background_task: Option<JoinHandle<()>>,
}

impl SyncService {
    /// Create a new sync service that assumes it starts online
    pub fn new(config: SyncConfig, api: Arc<dyn TripApi>, storage: Arc<dyn QueueStorage>) -> Self {
        Self::with_monitor(config, api, storage, NetworkMonitor::default())
    }

    /// Create a new sync service sharing a monitor the host platform updates
    pub fn with_monitor(
        config: SyncConfig,
        api: Arc<dyn TripApi>,
        storage: Arc<dyn QueueStorage>,
        monitor: NetworkMonitor,
    ) -> Self {
        let dispatcher = Dispatcher::new(&config, api, storage, monitor);
        let scheduler = DrainScheduler::new(config.drain_interval);
        Self {
            config,
            dispatcher,
            scheduler,
            background_task: None,
        }
    }

    /// Start the background sync task
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.is_running() {
            return Err(ServiceError::AlreadyRunning);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;

        let dispatcher = self.dispatcher.clone();
        let scheduler = self.scheduler;
        self.background_task = Some(handle.spawn(async move {
            Self::background_sync_loop(dispatcher, scheduler).await;
        }));
        tracing::info!(interval = ?self.scheduler.interval(), "sync service started");
        Ok(())
    }

    /// Stop the background sync task
    pub fn stop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
            tracing::info!("sync service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drain now, regardless of the timer. Skipped while offline.
    pub async fn force_sync(&self) -> DrainReport {
        self.dispatcher.drain().await
    }

    /// Get current sync status
    pub fn status(&self) -> SyncStatus {
        let stats = self.dispatcher.queue_stats();
        SyncStatus {
            is_running: self.is_running(),
            is_syncing: self.dispatcher.is_draining(),
            is_online: self.dispatcher.monitor().is_online(),
            pending_actions: stats.total,
            retrying_actions: stats.retrying,
            last_drain: self.dispatcher.last_drain(),
            metrics: self.dispatcher.metrics(),
        }
    }

    /// Outcome stream for every action, including ones replayed after a restart
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.dispatcher.subscribe()
    }

    /// Debounced autosave for one trip's draft
    pub fn draft_autosave(&self, trip_id: impl Into<String>) -> DraftAutosave {
        DraftAutosave::spawn(self.dispatcher.clone(), trip_id, self.config.draft_debounce)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        self.dispatcher.monitor()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Background sync loop
    async fn background_sync_loop(dispatcher: Dispatcher, scheduler: DrainScheduler) {
        let mut network = dispatcher.monitor().subscribe();
        let mut ticker = scheduler.ticker();

        if dispatcher.monitor().is_online() && dispatcher.pending_len() > 0 {
            dispatcher.drain().await;
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if dispatcher.monitor().is_online() && dispatcher.pending_len() > 0 {
                        dispatcher.drain().await;
                    }
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *network.borrow_and_update();
                    if status == NetworkStatus::Online {
                        tracing::debug!("back online, draining");
                        dispatcher.drain().await;
                    }
                }
            }
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
        }
    }
}

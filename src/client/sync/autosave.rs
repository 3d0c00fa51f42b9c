//! # Trip Draft Autosave
//!
//! Debounces rapid edits to one trip's draft. Every edit restarts the quiet
//! period; when it elapses the latest draft goes to
//! [`Dispatcher::save_trip_draft`], which still applies the in-flight guard
//! and the per-trip cooldown.
//!
//! Dropping the handle (or calling [`DraftAutosave::finish`]) flushes an
//! edit that is still waiting.

use crate::client::offline::dispatcher::{Dispatcher, DraftSave};
use crate::shared::trip::TripDraft;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct DraftAutosave {
    trip_id: String,
    edits: mpsc::UnboundedSender<TripDraft>,
    task: JoinHandle<()>,
}

impl DraftAutosave {
    /// Start the debounce task. Must be called within a tokio runtime.
    pub fn spawn(dispatcher: Dispatcher, trip_id: impl Into<String>, debounce: Duration) -> Self {
        let trip_id = trip_id.into();
        let (edits, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(dispatcher, trip_id.clone(), debounce, rx));
        Self {
            trip_id,
            edits,
            task,
        }
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Record an edit; `false` if the task is gone.
    pub fn edit(&self, draft: TripDraft) -> bool {
        self.edits.send(draft).is_ok()
    }

    /// Flush a waiting edit and wait for the task to end.
    pub async fn finish(self) {
        let Self { edits, task, .. } = self;
        drop(edits);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "draft autosave task failed");
        }
    }
}

async fn debounce_loop(
    dispatcher: Dispatcher,
    trip_id: String,
    debounce: Duration,
    mut edits: mpsc::UnboundedReceiver<TripDraft>,
) {
    let mut pending: Option<TripDraft> = None;

    loop {
        let Some(draft) = pending.take() else {
            match edits.recv().await {
                Some(draft) => {
                    pending = Some(draft);
                    continue;
                }
                None => return,
            }
        };

        tokio::select! {
            next = edits.recv() => match next {
                Some(newer) => pending = Some(newer),
                None => {
                    flush(&dispatcher, &trip_id, draft).await;
                    return;
                }
            },
            _ = tokio::time::sleep(debounce) => flush(&dispatcher, &trip_id, draft).await,
        }
    }
}

async fn flush(dispatcher: &Dispatcher, trip_id: &str, draft: TripDraft) {
    match dispatcher.save_trip_draft(trip_id, draft).await {
        DraftSave::Saved => tracing::debug!(%trip_id, "autosaved trip draft"),
        DraftSave::Deferred { retry_in } => {
            tracing::debug!(%trip_id, ?retry_in, "autosave deferred by cooldown")
        }
        DraftSave::InFlight => tracing::debug!(%trip_id, "autosave behind an in-flight save"),
        DraftSave::Queued(_) => tracing::info!(%trip_id, "autosave queued for replay"),
        DraftSave::Failed(error) => tracing::warn!(%trip_id, %error, "autosave rejected"),
    }
}

/**
 * plann.er Sync Agent Entry Point
 *
 * Headless agent that replays the persisted pending-action queue against the
 * trip API and logs every outcome until Ctrl-C.
 *
 * Usage: planner-sync [config.toml]
 */

use planner_sync::client::offline::{ActionOutcome, FileStorage};
use planner_sync::client::sync::{NetworkMonitor, SyncService};
use planner_sync::client::trip_api::HttpTripApi;
use planner_sync::client::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    if config.get_token().is_none() {
        tracing::warn!("PLANNER_TOKEN is not set, requests will be unauthenticated");
    }

    let storage = Arc::new(FileStorage::new(config.sync().queue_path.clone()));
    tracing::info!(
        api_url = %config.server_url(),
        queue = %storage.path().display(),
        "starting sync agent"
    );

    let api = Arc::new(HttpTripApi::new(config.clone())?);
    let mut service = SyncService::new(config.sync().clone(), api, storage);
    let mut events = service.subscribe();
    service.start()?;
    let watcher = tokio::spawn(watch_connectivity(
        service.monitor().clone(),
        config.server_url().to_string(),
        config.sync().drain_interval,
        config.sync().request_timeout,
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => match &event.outcome {
                    ActionOutcome::Succeeded(_) => {
                        tracing::info!(action_id = %event.action_id, trip_id = %event.trip_id, "action confirmed")
                    }
                    ActionOutcome::Failed { error, attempts, terminal } => tracing::warn!(
                        action_id = %event.action_id,
                        trip_id = %event.trip_id,
                        attempts,
                        terminal,
                        %error,
                        "action failed"
                    ),
                    ActionOutcome::Offline => {
                        tracing::info!(action_id = %event.action_id, "offline, action kept queued")
                    }
                },
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    watcher.abort();
    service.stop();
    let status = service.status();
    tracing::info!(
        pending = status.pending_actions,
        succeeded = status.metrics.succeeded,
        abandoned = status.metrics.abandoned,
        "sync agent stopped"
    );
    Ok(())
}

/// Host side of the network monitor. While offline, checks every `every`
/// whether the API host accepts connections again and flips the monitor
/// online when it does, which starts a drain.
async fn watch_connectivity(
    monitor: NetworkMonitor,
    api_url: String,
    every: Duration,
    timeout: Duration,
) {
    let Some(addr) = socket_addr(&api_url) else {
        tracing::warn!(%api_url, "cannot derive a host to watch, reconnects need a restart");
        return;
    };
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if monitor.is_online() {
            continue;
        }
        let connect = tokio::net::TcpStream::connect(addr.as_str());
        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(_)) => {
                tracing::info!(%addr, "api host reachable again");
                monitor.set_online();
            }
            Ok(Err(e)) => tracing::debug!(%addr, error = %e, "api host still unreachable"),
            Err(_) => tracing::debug!(%addr, "api host check timed out"),
        }
    }
}

fn socket_addr(api_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(api_url).ok()?;
    Some(format!("{}:{}", url.host_str()?, url.port_or_known_default()?))
}

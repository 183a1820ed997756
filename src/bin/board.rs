//! Staff order board: runs the kitchen and waiter views headlessly and logs
//! every notice and status change. Configuration comes from the OS keyring
//! (set up at enrollment) with `SMARTDINE_BASE_URL` as an override.

use anyhow::{anyhow, Context};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use smartdine_terminal::views::kitchen::KitchenView;
use smartdine_terminal::views::waiter::WaiterView;
use smartdine_terminal::{storage, ApiClient, AuthService, EventBus, NoticeLevel, UiEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    smartdine_terminal::init_logging(None);

    let base_url = std::env::var("SMARTDINE_BASE_URL")
        .ok()
        .or_else(storage::get_base_url)
        .ok_or_else(|| {
            anyhow!("no backend configured: set SMARTDINE_BASE_URL or enroll this terminal")
        })?;

    let events = EventBus::default();
    let auth = Arc::new(AuthService::new(
        &base_url,
        Box::new(storage::KeyringVault),
        events.clone(),
    ));
    if !auth.is_logged_in() {
        warn!("no staff session found; polls will fail until someone logs in");
    }

    let api = Arc::new(
        ApiClient::new(&base_url, auth)
            .map_err(|e| anyhow!(e))
            .context("building API client")?
            .with_device_id(storage::device_id()),
    );
    info!(base_url = %api.base_url(), "starting order board");

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let kitchen = KitchenView::new(api.clone(), events.clone());
    kitchen.start(&tracker, cancel.clone());
    let waiter = WaiterView::new(api, events.clone());
    waiter.start(&tracker, cancel.clone());

    // Mirror every UI event into the log so the headless board is observable.
    let mut rx = events.subscribe();
    let mirror_cancel = cancel.clone();
    tracker.spawn(async move {
        loop {
            let event = tokio::select! {
                _ = mirror_cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event log fell behind, some events not logged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            match event {
                UiEvent::Notice(n) => match n.level {
                    NoticeLevel::Error => error!(message = %n.message, "notice"),
                    NoticeLevel::Info => info!(message = %n.message, "notice"),
                    NoticeLevel::Success => info!(message = %n.message, "notice"),
                },
                UiEvent::OrderStatusUpdated { order_id, status } => {
                    info!(%order_id, %status, "order status updated");
                }
                UiEvent::SnapshotApplied { view, seq, count } => {
                    info!(view, seq, count, "snapshot applied");
                }
                UiEvent::SessionExpired => {
                    warn!("session expired, log in again to resume polling");
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    cancel.cancel();
    tracker.close();
    tracker.wait().await;
    Ok(())
}

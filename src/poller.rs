//! Background poll and timer loops.
//!
//! Each board runs one poll loop (fetch -> snapshot apply) and one
//! once-per-second timer loop. Loops are spawned on a [`TaskTracker`] and
//! stopped through a [`CancellationToken`]; in-flight requests are not
//! aborted on shutdown, but their snapshots carry a superseded sequence
//! number and land inert.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::board::OrderBoard;
use crate::events::{EventBus, NoticeLevel, UiEvent};
use crate::model::Order;

/// Local countdown resolution.
const TIMER_TICK: Duration = Duration::from_secs(1);

/// Spawn the poll loop for one board.
///
/// Every `poll_interval` (first tick immediately, as on mount) the `fetch`
/// future is awaited and its result applied to the board with the poll's
/// sequence number. A failed fetch logs, raises an error notice, and leaves
/// the previous snapshot in place - stale data beats a blank board. The next
/// tick is the only retry.
pub fn spawn_order_poll_loop<F, Fut>(
    tracker: &TaskTracker,
    cancel: CancellationToken,
    board: Arc<OrderBoard>,
    events: EventBus,
    view: &'static str,
    poll_interval: Duration,
    fetch: F,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Order>, ApiError>> + Send + 'static,
{
    tracker.spawn(async move {
        info!(
            view,
            interval_ms = poll_interval.as_millis() as u64,
            "order poll loop started"
        );
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(view, "order poll loop stopped");
                    break;
                }
                _ = ticker.tick() => {}
            }

            seq += 1;
            match fetch().await {
                Ok(orders) => {
                    let count = orders.len();
                    if board.apply_snapshot(seq, orders, Utc::now()) {
                        debug!(view, seq, count, "poll snapshot applied");
                        events.emit(UiEvent::SnapshotApplied { view, seq, count });
                    }
                }
                Err(e) => {
                    warn!(view, error = %e, "order poll failed; keeping last known orders");
                    events.notify(
                        NoticeLevel::Error,
                        format!("Could not refresh {view} orders: {e}"),
                    );
                }
            }
        }
    });
}

/// Spawn the one-second countdown tick for a board. Independent of polling;
/// only affects displayed remaining values, never the authoritative status.
pub fn spawn_timer_loop(tracker: &TaskTracker, cancel: CancellationToken, board: Arc<OrderBoard>) {
    tracker.spawn(async move {
        let mut ticker = interval(TIMER_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => board.tick_timers(),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn sample_order(id: &str) -> Order {
        Order {
            id: id.into(),
            table_number: 3,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            estimated_time: Some(10),
            items: vec![],
            total: 12.0,
            chef: None,
        }
    }

    #[tokio::test]
    async fn poll_loop_applies_snapshots_until_cancelled() {
        let board = Arc::new(OrderBoard::new());
        let events = EventBus::new(32);
        let mut rx = events.subscribe();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let calls = Arc::new(AtomicU64::new(0));

        let calls_in_fetch = calls.clone();
        spawn_order_poll_loop(
            &tracker,
            cancel.clone(),
            board.clone(),
            events.clone(),
            "kitchen",
            Duration::from_millis(10),
            move || {
                let n = calls_in_fetch.fetch_add(1, Ordering::SeqCst);
                async move { Ok(vec![sample_order(&format!("o-{n}"))]) }
            },
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        assert!(calls.load(Ordering::SeqCst) >= 2, "loop should have polled repeatedly");
        assert_eq!(board.len(), 1, "each snapshot replaces the collection wholesale");
        assert!(
            matches!(rx.try_recv(), Ok(UiEvent::SnapshotApplied { view: "kitchen", .. })),
            "snapshot application must be announced"
        );
    }

    #[tokio::test]
    async fn poll_failure_keeps_previous_snapshot_and_raises_error_notice() {
        let board = Arc::new(OrderBoard::new());
        let events = EventBus::new(32);
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let calls = Arc::new(AtomicU64::new(0));

        let calls_in_fetch = calls.clone();
        spawn_order_poll_loop(
            &tracker,
            cancel.clone(),
            board.clone(),
            events.clone(),
            "waiter",
            Duration::from_millis(10),
            move || {
                let n = calls_in_fetch.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(vec![sample_order("stays")])
                    } else {
                        Err(ApiError::Network("backend unreachable".into()))
                    }
                }
            },
        );

        let mut rx = events.subscribe();
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        assert_eq!(
            board.orders().first().map(|o| o.id.clone()).as_deref(),
            Some("stays"),
            "stale-but-present data beats clearing the screen"
        );
        let mut saw_error_notice = false;
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::Notice(n) = event {
                if n.level == NoticeLevel::Error {
                    saw_error_notice = true;
                }
            }
        }
        assert!(saw_error_notice, "fetch failures surface as an error notice");
    }

    #[tokio::test]
    async fn timer_loop_stops_on_cancel() {
        let board = Arc::new(OrderBoard::new());
        board.apply_snapshot(1, vec![sample_order("t")], Utc::now());
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        spawn_timer_loop(&tracker, cancel.clone(), board.clone());
        cancel.cancel();
        tracker.close();
        tracker.wait().await;
    }
}

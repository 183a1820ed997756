//! Kitchen board: active orders with countdowns, advanced one step at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::board::OrderBoard;
use crate::events::{EventBus, NoticeLevel, UiEvent};
use crate::model::OrderStatus;
use crate::poller::{spawn_order_poll_loop, spawn_timer_loop};

/// Kitchen staff expect new orders quickly; the kitchen board polls tightest.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct KitchenView {
    api: Arc<ApiClient>,
    pub board: Arc<OrderBoard>,
    events: EventBus,
    poll_interval: Duration,
}

impl KitchenView {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self {
            api,
            board: Arc::new(OrderBoard::new()),
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the poll and countdown loops for this board.
    pub fn start(&self, tracker: &TaskTracker, cancel: CancellationToken) {
        let api = self.api.clone();
        spawn_order_poll_loop(
            tracker,
            cancel.clone(),
            self.board.clone(),
            self.events.clone(),
            "kitchen",
            self.poll_interval,
            move || {
                let api = api.clone();
                async move { api.list_kitchen_orders().await }
            },
        );
        spawn_timer_loop(tracker, cancel, self.board.clone());
    }

    /// Advance an order to its next lifecycle step
    /// (pending -> preparing -> ready).
    ///
    /// Ready orders are left for the waiter board; served is not a kitchen
    /// transition. A 403 from the backend means a colleague already moved the
    /// order and is surfaced as information, not failure.
    pub async fn advance_order(&self, order_id: &str) -> Result<(), ApiError> {
        let Some(order) = self.board.get(order_id) else {
            self.events.notify(
                NoticeLevel::Info,
                "That order is no longer on the board".to_string(),
            );
            return Ok(());
        };

        let Some(target) = order.status.next() else {
            return Ok(());
        };
        if target == OrderStatus::Served {
            self.events.notify(
                NoticeLevel::Info,
                "Ready orders are served from the waiter board".to_string(),
            );
            return Ok(());
        }

        info!(order_id, from = %order.status, to = %target, "advancing kitchen order");
        let outcome = self.api.update_kitchen_status(order_id, target).await;
        self.apply_transition_outcome(order_id, target, outcome)
    }

    /// Fold the backend's answer into board state and notices. Split out so
    /// the 403 and failure paths are testable without a live backend.
    fn apply_transition_outcome(
        &self,
        order_id: &str,
        target: OrderStatus,
        outcome: Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        match outcome {
            Ok(()) => {
                self.board.update_status(order_id, target);
                self.events.notify(
                    NoticeLevel::Success,
                    format!("Order moved to {target}"),
                );
                self.events.emit(UiEvent::OrderStatusUpdated {
                    order_id: order_id.to_string(),
                    status: target,
                });
                Ok(())
            }
            Err(ApiError::Forbidden) => {
                // A colleague claimed the order between polls. The board keeps
                // showing what we knew; the next poll brings their update.
                self.events.notify(
                    NoticeLevel::Info,
                    "Someone else is handling this order".to_string(),
                );
                Ok(())
            }
            Err(e) => {
                self.events
                    .notify(NoticeLevel::Error, format!("Could not update order: {e}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, MemoryVault};
    use crate::model::Order;
    use chrono::Utc;

    fn view_with(orders: Vec<Order>) -> KitchenView {
        let events = EventBus::new(32);
        let auth = Arc::new(AuthService::new(
            "https://api.smartdine.test",
            Box::new(MemoryVault::default()),
            events.clone(),
        ));
        let api = Arc::new(ApiClient::new("https://api.smartdine.test", auth).expect("client"));
        let view = KitchenView::new(api, events);
        view.board.apply_snapshot(1, orders, Utc::now());
        view
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.into(),
            table_number: 4,
            status,
            created_at: Utc::now(),
            estimated_time: Some(15),
            items: vec![],
            total: 30.0,
            chef: None,
        }
    }

    #[test]
    fn confirmed_transition_updates_board_and_announces() {
        let view = view_with(vec![order("a", OrderStatus::Pending)]);
        let mut rx = view.events.subscribe();

        view.apply_transition_outcome("a", OrderStatus::Preparing, Ok(()))
            .expect("confirmed transition");

        assert_eq!(
            view.board.get("a").map(|o| o.status),
            Some(OrderStatus::Preparing)
        );
        let mut saw_update = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(
                event,
                UiEvent::OrderStatusUpdated { ref order_id, status: OrderStatus::Preparing }
                    if order_id == "a"
            ) {
                saw_update = true;
            }
        }
        assert!(saw_update);
    }

    #[test]
    fn forbidden_transition_is_informational_and_leaves_board_alone() {
        let view = view_with(vec![order("b", OrderStatus::Pending)]);
        let mut rx = view.events.subscribe();

        view.apply_transition_outcome("b", OrderStatus::Preparing, Err(ApiError::Forbidden))
            .expect("a colleague's claim is not a failure");

        assert_eq!(
            view.board.get("b").map(|o| o.status),
            Some(OrderStatus::Pending),
            "board must not change on 403"
        );
        match rx.try_recv() {
            Ok(UiEvent::Notice(n)) => {
                assert_eq!(n.level, NoticeLevel::Info, "403 is information, not error");
                assert!(n.message.contains("Someone else"));
            }
            other => panic!("expected an info notice, got {other:?}"),
        }
    }

    #[test]
    fn failed_transition_keeps_board_and_raises_error() {
        let view = view_with(vec![order("c", OrderStatus::Preparing)]);
        let mut rx = view.events.subscribe();

        let err = view
            .apply_transition_outcome(
                "c",
                OrderStatus::Ready,
                Err(ApiError::Network("backend unreachable".into())),
            )
            .expect_err("network failures propagate");
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(
            view.board.get("c").map(|o| o.status),
            Some(OrderStatus::Preparing)
        );
        match rx.try_recv() {
            Ok(UiEvent::Notice(n)) => assert_eq!(n.level, NoticeLevel::Error),
            other => panic!("expected an error notice, got {other:?}"),
        }
    }
}

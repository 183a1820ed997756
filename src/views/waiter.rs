//! Waiter board: today's ready orders, cleared one table at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::board::OrderBoard;
use crate::events::{EventBus, NoticeLevel, UiEvent};
use crate::model::OrderStatus;
use crate::poller::spawn_order_poll_loop;

/// Ready orders change slower than the kitchen queue.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

pub struct WaiterView {
    api: Arc<ApiClient>,
    pub board: Arc<OrderBoard>,
    events: EventBus,
    poll_interval: Duration,
}

impl WaiterView {
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

    /// Start the ready-orders poll loop. No countdown loop here: ready orders
    /// are past their preparation window.
    pub fn start(&self, tracker: &TaskTracker, cancel: CancellationToken) {
        let api = self.api.clone();
        spawn_order_poll_loop(
            tracker,
            cancel.clone(),
            self.board.clone(),
            self.events.clone(),
            "waiter",
            self.poll_interval,
            move || {
                let api = api.clone();
                async move { api.list_waiter_ready_orders().await }
            },
        );
    }

    /// Mark a ready order as served and take it off the board.
    ///
    /// The order is removed only after the backend confirms; if the call
    /// fails, it stays visible so the table is not forgotten. A 403 means
    /// another waiter got there first.
    pub async fn mark_served(&self, order_id: &str) -> Result<(), ApiError> {
        info!(order_id, "marking order served");
        let outcome = self.api.mark_served(order_id).await;
        self.apply_mark_served_outcome(order_id, outcome)
    }

    fn apply_mark_served_outcome(
        &self,
        order_id: &str,
        outcome: Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        match outcome {
            Ok(()) => {
                let table = self.board.get(order_id).map(|o| o.table_number);
                self.board.remove_order(order_id);
                let message = match table {
                    Some(table) => format!("Table {table} served"),
                    None => "Order served".to_string(),
                };
                self.events.notify(NoticeLevel::Success, message);
                self.events.emit(UiEvent::OrderStatusUpdated {
                    order_id: order_id.to_string(),
                    status: OrderStatus::Served,
                });
                Ok(())
            }
            Err(ApiError::Forbidden) => {
                self.events.notify(
                    NoticeLevel::Info,
                    "Someone else is handling this order".to_string(),
                );
                Ok(())
            }
            Err(e) => {
                self.events.notify(
                    NoticeLevel::Error,
                    format!("Could not mark order served: {e}"),
                );
                Err(e)
            }
        }
    }
}

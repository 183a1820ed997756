//! Customer-facing order tracking: one order, no authentication.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::events::{EventBus, NoticeLevel, UiEvent};
use crate::model::{Order, OrderStatus, Urgency};

/// Customers watch a single order; a relaxed poll is plenty.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// One order as shown on the tracking page: current status plus the derived
/// countdown, when the order is still in a timed phase.
#[derive(Debug, Clone)]
pub struct TrackedOrder {
    pub order: Order,
    pub remaining_secs: Option<i64>,
    pub urgency: Option<Urgency>,
}

impl TrackedOrder {
    pub fn from_order(order: Order, now: DateTime<Utc>) -> Self {
        let remaining_secs = order.remaining_at(now);
        Self {
            urgency: remaining_secs.map(Urgency::from_remaining),
            remaining_secs,
            order,
        }
    }
}

pub struct TrackingView {
    api: Arc<ApiClient>,
    events: EventBus,
    poll_interval: Duration,
}

impl TrackingView {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self {
            api,
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Fetch the order's current state once.
    pub async fn fetch_once(&self, order_id: &str) -> Result<TrackedOrder, ApiError> {
        let order = self.api.get_order(order_id).await?;
        Ok(TrackedOrder::from_order(order, Utc::now()))
    }

    /// Follow one order until it is served, announcing each status change.
    /// Fetch failures keep the last known state; the next tick retries.
    pub fn start(
        &self,
        tracker: &TaskTracker,
        cancel: CancellationToken,
        order_id: String,
    ) {
        let api = self.api.clone();
        let events = self.events.clone();
        let poll_interval = self.poll_interval;
        tracker.spawn(async move {
            info!(order_id, "tracking order");
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_status: Option<OrderStatus> = None;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match api.get_order(&order_id).await {
                    Ok(order) => {
                        if last_status != Some(order.status) {
                            last_status = Some(order.status);
                            events.emit(UiEvent::OrderStatusUpdated {
                                order_id: order_id.clone(),
                                status: order.status,
                            });
                        }
                        if order.status == OrderStatus::Served {
                            info!(order_id, "order served, tracking finished");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(order_id, error = %e, "order tracking fetch failed");
                        events.notify(
                            NoticeLevel::Error,
                            format!("Could not refresh your order: {e}"),
                        );
                    }
                }
            }
        });
    }
}

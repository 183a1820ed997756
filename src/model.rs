//! Order data model shared by every board.
//!
//! Defines the canonical status vocabulary with its forward-only transition
//! table, the order projection the backend returns, and the urgency buckets
//! used to colour countdowns. The backend owns the authoritative lifecycle;
//! everything here is a read-mostly mirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Countdown above this many seconds is still comfortable.
pub const SAFE_THRESHOLD_SECS: i64 = 600;
/// Countdown above this many seconds (but at or below safe) needs attention.
pub const WARNING_THRESHOLD_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// Status model
// ---------------------------------------------------------------------------

/// Order lifecycle status. Only forward transitions are legal; `Served` is
/// terminal from the client's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
}

impl OrderStatus {
    /// The single legal next status, or `None` for `Served`.
    ///
    /// Boards only ever offer this step; no skip or backward transition is
    /// exposed anywhere. The backend is trusted to reject anything else.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Served),
            OrderStatus::Served => None,
        }
    }

    /// Wire representation, matching the backend's string enum.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
        }
    }

    /// Whether a preparation countdown still applies to this status.
    /// Ready/served orders are out of the kitchen and no longer timed.
    pub fn is_timed(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Preparing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Urgency buckets
// ---------------------------------------------------------------------------

/// Display bucket for a remaining-time value. The same thresholds drive the
/// numeric colour and the progress bar on the kitchen board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Safe,
    Warning,
    Urgent,
}

impl Urgency {
    /// Classify a remaining-seconds value: > 600 s safe, > 300 s warning,
    /// everything else urgent.
    pub fn from_remaining(remaining_secs: i64) -> Urgency {
        if remaining_secs > SAFE_THRESHOLD_SECS {
            Urgency::Safe
        } else if remaining_secs > WARNING_THRESHOLD_SECS {
            Urgency::Warning
        } else {
            Urgency::Urgent
        }
    }
}

// ---------------------------------------------------------------------------
// Order projection
// ---------------------------------------------------------------------------

/// One line of an order: a menu item or a custom dish, with quantity and the
/// server-computed subtotal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "menuItemId", alias = "menu_item_id")]
    pub menu_item: Option<String>,
    #[serde(default, alias = "customDishId", alias = "custom_dish_id")]
    pub custom_dish: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub subtotal: f64,
}

fn default_quantity() -> i64 {
    1
}

/// The staff member who claimed an order on the kitchen board. `None` means
/// unclaimed; a claimed order is actionable only by that chef (the backend
/// answers 403 for anyone else).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChefRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read-mostly projection of a backend order. Accepts both snake_case and
/// camelCase field spellings since older backend builds emit either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(alias = "tableNumber")]
    pub table_number: i64,
    pub status: OrderStatus,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Estimated preparation time in minutes. Display-only; never enforced.
    #[serde(default, alias = "estimatedTime")]
    pub estimated_time: Option<i64>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub chef: Option<ChefRef>,
}

impl Order {
    /// Remaining preparation seconds at `now`, floored at zero.
    ///
    /// `remaining = max(0, estimated_time * 60 - (now - created_at))`.
    /// Returns `None` when no estimate was set or the status is no longer
    /// timed. Purely derived from authoritative fields, so a reload always
    /// reconstructs the same value.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.status.is_timed() {
            return None;
        }
        let estimate_mins = self.estimated_time?;
        let elapsed = (now - self.created_at).num_seconds();
        Some((estimate_mins * 60 - elapsed).max(0))
    }
}

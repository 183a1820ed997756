//! Shared board state: the polled order snapshot and its countdown timers.
//!
//! A board holds the last applied poll snapshot plus a per-order
//! remaining-seconds map. Snapshots replace the collection wholesale; the
//! timer map is reseeded from `created_at`/`estimated_time` on every apply,
//! so local drift self-corrects once per poll and a reload loses nothing.
//! Each snapshot carries the monotonic sequence number of the poll that
//! issued it, and a snapshot older than the one already applied is discarded
//! even if its response settled last.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::model::{Order, OrderStatus, Urgency};

#[derive(Default)]
pub struct OrderBoard {
    orders: Mutex<Vec<Order>>,
    /// Order id -> remaining whole seconds, floored at zero. Entries exist
    /// only for timed orders present in the current snapshot.
    timers: Mutex<HashMap<String, i64>>,
    last_applied_seq: AtomicU64,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board with a poll snapshot.
    ///
    /// Returns `false` (leaving the board untouched) when `seq` is not newer
    /// than the last applied snapshot - the response of a superseded request
    /// arriving late must not clobber fresher data.
    pub fn apply_snapshot(&self, seq: u64, orders: Vec<Order>, now: DateTime<Utc>) -> bool {
        let mut held_orders = self.orders.lock().expect("board orders lock");
        let mut held_timers = self.timers.lock().expect("board timers lock");

        let prev = self.last_applied_seq.load(Ordering::Acquire);
        if seq <= prev && prev != 0 {
            debug!(seq, prev, "discarding stale poll snapshot");
            return false;
        }
        self.last_applied_seq.store(seq, Ordering::Release);

        let mut timers = HashMap::new();
        for order in &orders {
            if let Some(remaining) = order.remaining_at(now) {
                timers.insert(order.id.clone(), remaining);
            }
        }

        *held_orders = orders;
        *held_timers = timers;
        true
    }

    /// One local clock tick: decrement every countdown, flooring at zero.
    /// Runs independently of polling and only affects display values.
    pub fn tick_timers(&self) {
        let mut timers = self.timers.lock().expect("board timers lock");
        for remaining in timers.values_mut() {
            *remaining = (*remaining - 1).max(0);
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().expect("board orders lock").clone()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().expect("board orders lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders
            .lock()
            .expect("board orders lock")
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    pub fn remaining(&self, order_id: &str) -> Option<i64> {
        self.timers
            .lock()
            .expect("board timers lock")
            .get(order_id)
            .copied()
    }

    pub fn urgency(&self, order_id: &str) -> Option<Urgency> {
        self.remaining(order_id).map(Urgency::from_remaining)
    }

    /// Optimistically set an order's status after a confirmed transition.
    /// The next poll snapshot brings the authoritative view. Returns `false`
    /// when the order is not on the board.
    pub fn update_status(&self, order_id: &str, status: OrderStatus) -> bool {
        let mut orders = self.orders.lock().expect("board orders lock");
        let Some(order) = orders.iter_mut().find(|o| o.id == order_id) else {
            return false;
        };
        order.status = status;
        if !status.is_timed() {
            self.timers
                .lock()
                .expect("board timers lock")
                .remove(order_id);
        }
        true
    }

    /// Remove an order (waiter "mark served" optimistic removal). Returns
    /// `false` when the order was not on the board.
    pub fn remove_order(&self, order_id: &str) -> bool {
        let mut orders = self.orders.lock().expect("board orders lock");
        let before = orders.len();
        orders.retain(|o| o.id != order_id);
        self.timers
            .lock()
            .expect("board timers lock")
            .remove(order_id);
        orders.len() != before
    }

    /// Orders sorted most-urgent-first: timed orders by ascending remaining
    /// seconds, then untimed ones by age (oldest first).
    pub fn sorted_by_urgency(&self) -> Vec<Order> {
        let timers = self.timers.lock().expect("board timers lock").clone();
        let mut orders = self.orders.lock().expect("board orders lock").clone();
        orders.sort_by(|a, b| {
            match (timers.get(&a.id), timers.get(&b.id)) {
                (Some(ra), Some(rb)) => ra.cmp(rb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.created_at.cmp(&b.created_at),
            }
        });
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order(id: &str, status: OrderStatus, created_secs_ago: i64, estimate: Option<i64>) -> Order {
        Order {
            id: id.into(),
            table_number: 1,
            status,
            created_at: Utc::now() - Duration::seconds(created_secs_ago),
            estimated_time: estimate,
            items: vec![],
            total: 0.0,
            chef: None,
        }
    }

    #[test]
    fn snapshot_seeds_timers_from_created_at_and_estimate() {
        let board = OrderBoard::new();
        // 3 minutes old, 10 minute estimate: 420 s remaining -> warning.
        let orders = vec![order("42", OrderStatus::Preparing, 180, Some(10))];
        let now = Utc::now();
        let applied = board.apply_snapshot(1, orders, now);
        assert!(applied);
        assert_eq!(board.remaining("42"), Some(420));
        assert_eq!(board.urgency("42"), Some(Urgency::Warning));
    }

    #[test]
    fn tick_floors_at_zero_and_never_goes_negative() {
        let board = OrderBoard::new();
        let orders = vec![order("a", OrderStatus::Pending, 598, Some(10))];
        let now = Utc::now();
        board.apply_snapshot(1, orders, now);
        assert_eq!(board.remaining("a"), Some(2));
        for _ in 0..5 {
            board.tick_timers();
        }
        assert_eq!(board.remaining("a"), Some(0), "must stay floored at zero");
    }

    #[test]
    fn stale_sequence_snapshot_is_discarded() {
        let board = OrderBoard::new();
        let now = Utc::now();
        assert!(board.apply_snapshot(2, vec![order("new", OrderStatus::Ready, 60, None)], now));
        // The response of poll #1 settles after poll #2's was applied.
        assert!(!board.apply_snapshot(1, vec![order("old", OrderStatus::Ready, 60, None)], now));

        let ids: Vec<String> = board.orders().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["new"], "late stale response must not win");
    }

    #[test]
    fn reseeding_discards_timers_for_departed_orders() {
        let board = OrderBoard::new();
        let now = Utc::now();
        board.apply_snapshot(1, vec![order("gone", OrderStatus::Pending, 0, Some(5))], now);
        assert!(board.remaining("gone").is_some());

        board.apply_snapshot(2, vec![order("here", OrderStatus::Pending, 0, Some(5))], now);
        assert_eq!(board.remaining("gone"), None);
        assert!(board.remaining("here").is_some());
    }

    #[test]
    fn fresh_snapshot_corrects_local_tick_drift() {
        let board = OrderBoard::new();
        board.apply_snapshot(
            1,
            vec![order("d", OrderStatus::Preparing, 0, Some(10))],
            Utc::now(),
        );
        // Simulate an over-eager local clock.
        for _ in 0..120 {
            board.tick_timers();
        }
        assert_eq!(board.remaining("d"), Some(480));

        // The next poll recomputes from created_at; drift disappears.
        board.apply_snapshot(
            2,
            vec![order("d", OrderStatus::Preparing, 0, Some(10))],
            Utc::now(),
        );
        assert_eq!(board.remaining("d"), Some(600));
    }

    #[test]
    fn advancing_past_preparing_drops_the_countdown() {
        let board = OrderBoard::new();
        board.apply_snapshot(
            1,
            vec![order("x", OrderStatus::Preparing, 0, Some(10))],
            Utc::now(),
        );
        assert!(board.remaining("x").is_some());
        assert!(board.update_status("x", OrderStatus::Ready));
        assert_eq!(board.remaining("x"), None);
        assert_eq!(board.get("x").map(|o| o.status), Some(OrderStatus::Ready));
    }

    #[test]
    fn remove_order_clears_entry_and_timer() {
        let board = OrderBoard::new();
        board.apply_snapshot(
            1,
            vec![
                order("keep", OrderStatus::Ready, 0, None),
                order("drop", OrderStatus::Pending, 0, Some(5)),
            ],
            Utc::now(),
        );
        assert!(board.remove_order("drop"));
        assert!(!board.remove_order("drop"), "second removal is a no-op");
        assert_eq!(board.len(), 1);
        assert_eq!(board.remaining("drop"), None);
    }

    #[test]
    fn urgency_sort_puts_tightest_countdown_first() {
        let board = OrderBoard::new();
        let now = Utc::now();
        board.apply_snapshot(
            1,
            vec![
                order("relaxed", OrderStatus::Pending, 0, Some(20)),
                order("untimed", OrderStatus::Ready, 600, None),
                order("tight", OrderStatus::Preparing, 540, Some(10)),
            ],
            now,
        );
        let ids: Vec<String> = board
            .sorted_by_urgency()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["tight", "relaxed", "untimed"]);
    }
}

//! UI event bridge.
//!
//! Boards and actuators publish events on a broadcast channel; whatever is
//! rendering (terminal frontend, tests) subscribes. This replaces direct
//! toast/redraw calls so the service layer never talks to a screen.

use tokio::sync::broadcast;

use crate::model::OrderStatus;

/// Severity of a user-facing notice (the toast equivalent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Events the rendering layer can subscribe to.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Show a toast-style notice.
    Notice(Notice),
    /// An order's status changed (locally confirmed or observed in a poll).
    OrderStatusUpdated { order_id: String, status: OrderStatus },
    /// A poll snapshot was applied to a board.
    SnapshotApplied { view: &'static str, seq: u64, count: usize },
    /// The auth session ended (refresh rejected or 401); show the login screen.
    SessionExpired,
}

/// Cloneable handle for publishing and subscribing to [`UiEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody is listening, matching
    /// fire-and-forget emit semantics.
    pub fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(UiEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.notify(NoticeLevel::Info, "nobody is listening");
    }

    #[test]
    fn subscribers_receive_notices_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.notify(NoticeLevel::Success, "first");
        bus.notify(NoticeLevel::Error, "second");

        match rx.try_recv().expect("first event") {
            UiEvent::Notice(n) => {
                assert_eq!(n.level, NoticeLevel::Success);
                assert_eq!(n.message, "first");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.try_recv().expect("second event") {
            UiEvent::Notice(n) => assert_eq!(n.level, NoticeLevel::Error),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

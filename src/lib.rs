//! SmartDine order terminal library.
//!
//! Backend client for the SmartDine restaurant platform: polls order
//! snapshots, derives preparation countdowns, and performs the staff status
//! transitions (pending -> preparing -> ready -> served). Role views share
//! one API client and one injected auth service; the customer tracking view
//! uses the same client unauthenticated.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod board;
pub mod db;
pub mod events;
pub mod model;
pub mod poller;
pub mod storage;
pub mod views;

pub use api::{ApiClient, ApiError, OrdersQuery};
pub use auth::{AuthError, AuthService, MemoryVault, TokenVault};
pub use board::OrderBoard;
pub use events::{EventBus, Notice, NoticeLevel, UiEvent};
pub use model::{Order, OrderStatus, Urgency};
pub use views::kitchen::KitchenView;
pub use views::tracking::{TrackedOrder, TrackingView};
pub use views::waiter::WaiterView;

/// Initialize structured logging (console, plus a rolling daily file when
/// `log_dir` is given). Call once at startup.
pub fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,smartdine_terminal=debug"));

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "smartdine");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            // Keep the guard alive for the lifetime of the process; dropping
            // it would stop flushing file logs.
            std::mem::forget(guard);
        }
        None => registry.init(),
    }
}

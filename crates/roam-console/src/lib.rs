//! roam-console: operator console core for a managed server.
//!
//! Raw log lines pushed by a backend are timestamped, staged, and merged into
//! a bounded scrollback on a fixed flush period. Each line is classified for
//! display and filtering, and `[Sync]:` lines feed a self-expiring progress
//! projection. Operator commands are echoed locally ahead of pending output
//! and forwarded through the `ConsoleBackend` trait.
//!
//! - `Terminal`: synchronous state owner, usable without a runtime
//! - `ConsoleService`: tokio loop serializing ingestion, flushes, expiry, and requests
//! - `LogHub` / `MockBackend`: push subscriptions and a test backend

pub mod backend;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod hub;
pub mod mock;
pub mod progress;
pub mod record;
pub mod scrollback;
pub mod service;
pub mod staging;
pub mod terminal;
pub mod view;

pub use backend::{BackendError, ConsoleBackend};
pub use classify::{classify, Subsystem, Tag};
pub use config::{ConfigError, ConsoleConfig};
pub use dispatch::{DispatchOutcome, OutboundCommand, RejectReason};
pub use hub::{LogHub, LogSubscription, PublishedLine, SERVER_LOG_CHANNEL};
pub use progress::ProgressState;
pub use record::LogRecord;
pub use service::{ConsoleEvent, ConsoleHandle, ConsoleService, ConsoleSnapshot, ServiceError};
pub use terminal::Terminal;
pub use view::{FilterChannel, ScrollAction, ScrollMetrics};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "roam-console"
}

//! Backend collaborator seam.
//!
//! The console never manages the server process itself. It consumes a push
//! subscription of raw lines, a running flag, and a command call from
//! whatever implements [`ConsoleBackend`].

use async_trait::async_trait;

use crate::hub::LogSubscription;

/// Failure reported by a backend for a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("server is not online")]
    NotRunning,
    #[error("command is empty")]
    EmptyCommand,
    #[error("unknown target {target:?}")]
    UnknownTarget { target: String },
    #[error("failed to send command: {0}")]
    Io(String),
    #[error("backend closed")]
    Closed,
}

/// What the console needs from the managed-server side.
#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    /// Open a push subscription on a named channel.
    fn subscribe(&self, channel: &str) -> LogSubscription;

    /// Whether the managed server currently accepts commands.
    fn is_running(&self) -> bool;

    /// Deliver a raw command to the server identified by `target`.
    async fn send_command(&self, target: &str, command: &str) -> Result<(), BackendError>;
}

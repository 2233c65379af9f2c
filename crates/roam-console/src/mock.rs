//! Mock backend for tests and offline replay.
//!
//! Records every command it receives and returns a pre-configured result.
//! Lines are pushed through an embedded [`LogHub`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{BackendError, ConsoleBackend};
use crate::hub::{LogHub, LogSubscription, SERVER_LOG_CHANNEL};

/// A command received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub target: String,
    pub command: String,
}

pub struct MockBackend {
    hub: LogHub,
    running: AtomicBool,
    sent: Mutex<Vec<SentCommand>>,
    send_error: Mutex<Option<BackendError>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// A running mock with an empty hub.
    pub fn new() -> Self {
        Self {
            hub: LogHub::new(),
            running: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
        }
    }

    /// Reuse an existing hub (e.g. one fed by a file replay).
    pub fn with_hub(self, hub: LogHub) -> Self {
        Self { hub, ..self }
    }

    pub fn with_running(self, running: bool) -> Self {
        self.running.store(running, Ordering::SeqCst);
        self
    }

    /// Make every subsequent `send_command` fail with `err`.
    pub fn with_send_error(self, err: BackendError) -> Self {
        match self.send_error.lock() {
            Ok(mut slot) => *slot = Some(err),
            Err(poisoned) => *poisoned.into_inner() = Some(err),
        }
        self
    }

    pub fn hub(&self) -> &LogHub {
        &self.hub
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Publish a line on the server log channel.
    pub fn emit(&self, line: impl Into<String>) -> usize {
        self.hub.publish(SERVER_LOG_CHANNEL, line)
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ConsoleBackend for MockBackend {
    fn subscribe(&self, channel: &str) -> LogSubscription {
        self.hub.subscribe(channel)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn send_command(&self, target: &str, command: &str) -> Result<(), BackendError> {
        let sent = SentCommand {
            target: target.to_owned(),
            command: command.to_owned(),
        };
        match self.sent.lock() {
            Ok(mut guard) => guard.push(sent),
            Err(poisoned) => poisoned.into_inner().push(sent),
        }
        let err = match self.send_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

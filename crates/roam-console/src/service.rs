//! Async console service.
//!
//! [`ConsoleService::spawn`] subscribes to the backend's log channel and
//! runs one task that owns the [`Terminal`]. Incoming lines, flush ticks,
//! progress deadlines, operator requests, and shutdown are all serialized
//! through a single `select!` loop, so no state is shared across tasks.
//! Changes are announced on an event channel; [`ConsoleHandle::snapshot`]
//! gives a polled read.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ConsoleBackend;
use crate::config::ConsoleConfig;
use crate::dispatch::{DispatchOutcome, RejectReason};
use crate::hub::{LogSubscription, PublishedLine};
use crate::progress::ProgressState;
use crate::record::LogRecord;
use crate::terminal::Terminal;
use crate::view::{FilterChannel, ScrollAction, ScrollMetrics};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("console loop has stopped")]
    Closed,
}

/// Change notifications emitted by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Records appended to the scrollback (a flush batch or one echo), with
    /// what the view did about the growth.
    Appended {
        records: Vec<LogRecord>,
        scroll: ScrollAction,
    },
    /// The progress projection changed; `None` means it expired.
    Progress(Option<ProgressState>),
    CommandRejected(RejectReason),
}

/// Polled read of the console state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSnapshot {
    pub channel: FilterChannel,
    /// Records passing the active filter, oldest first.
    pub visible: Vec<LogRecord>,
    pub total: usize,
    pub staged: usize,
    pub revision: u64,
    pub progress: Option<ProgressState>,
    pub pinned: bool,
    /// Scroll geometry after the last scroll event or append.
    pub scroll: ScrollMetrics,
    pub input_enabled: bool,
}

enum ConsoleRequest {
    Submit {
        command: String,
        reply: oneshot::Sender<DispatchOutcome>,
    },
    SetChannel(FilterChannel),
    Scroll(ScrollMetrics),
    ScrollToBottom,
    Snapshot(oneshot::Sender<ConsoleSnapshot>),
}

pub struct ConsoleService;

impl ConsoleService {
    /// Subscribe to `config.log_channel` on `backend` and start the loop on
    /// the current tokio runtime.
    pub fn spawn<B>(config: ConsoleConfig, backend: Arc<B>) -> ConsoleHandle
    where
        B: ConsoleBackend + 'static,
    {
        let config = config.normalized();
        let subscription = backend.subscribe(&config.log_channel);
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        info!(
            channel = %config.log_channel,
            capacity = config.scrollback_capacity,
            flush_ms = config.flush_interval_ms,
            "console starting"
        );

        let state = LoopState {
            terminal: Terminal::new(&config),
            backend,
            subscription,
            requests: request_rx,
            events: event_tx,
            feedback_tx,
            feedback_rx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(state.run(config.flush_interval()));

        ConsoleHandle {
            requests: request_tx,
            events: event_rx,
            cancel,
            join: Some(join),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owning handle for a running console loop. Dropping it stops the loop.
pub struct ConsoleHandle {
    requests: mpsc::UnboundedSender<ConsoleRequest>,
    events: mpsc::UnboundedReceiver<ConsoleEvent>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl ConsoleHandle {
    /// Submit a command as if typed into the input field.
    pub async fn submit(&self, command: impl Into<String>) -> Result<DispatchOutcome, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(ConsoleRequest::Submit {
            command: command.into(),
            reply,
        })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub fn set_channel(&self, channel: FilterChannel) -> Result<(), ServiceError> {
        self.send(ConsoleRequest::SetChannel(channel))
    }

    pub fn scroll(&self, metrics: ScrollMetrics) -> Result<(), ServiceError> {
        self.send(ConsoleRequest::Scroll(metrics))
    }

    pub fn scroll_to_bottom(&self) -> Result<(), ServiceError> {
        self.send(ConsoleRequest::ScrollToBottom)
    }

    pub async fn snapshot(&self) -> Result<ConsoleSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(ConsoleRequest::Snapshot(reply))?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Next change notification; `None` once the loop stopped and every
    /// pending event was read.
    pub async fn next_event(&mut self) -> Option<ConsoleEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ConsoleEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the loop. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled() || self.requests.is_closed()
    }

    /// Wait for the loop task to finish (after `shutdown` or on its own).
    pub async fn join(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "console loop task failed");
            }
        }
    }

    fn send(&self, request: ConsoleRequest) -> Result<(), ServiceError> {
        self.requests.send(request).map_err(|_| ServiceError::Closed)
    }
}

impl Drop for ConsoleHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct LoopState<B: ConsoleBackend + 'static> {
    terminal: Terminal,
    backend: Arc<B>,
    subscription: LogSubscription,
    requests: mpsc::UnboundedReceiver<ConsoleRequest>,
    events: mpsc::UnboundedSender<ConsoleEvent>,
    feedback_tx: mpsc::UnboundedSender<PublishedLine>,
    feedback_rx: mpsc::UnboundedReceiver<PublishedLine>,
    cancel: CancellationToken,
}

impl<B: ConsoleBackend + 'static> LoopState<B> {
    async fn run(mut self, flush_interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut subscribed = true;
        let mut accepting = true;

        // Lines already pushed are ingested before requests issued after them.
        loop {
            let deadline = self.terminal.progress_deadline();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.flush(),
                _ = wait_until(deadline) => {
                    if self.terminal.tick_progress(Instant::now()) {
                        self.emit(ConsoleEvent::Progress(None));
                    }
                }
                line = self.subscription.recv_stamped(), if subscribed => match line {
                    Some(line) => self.ingest(line),
                    None => {
                        debug!(channel = self.subscription.channel(), "log subscription closed");
                        subscribed = false;
                    }
                },
                Some(line) = self.feedback_rx.recv() => self.ingest(line),
                request = self.requests.recv(), if accepting => match request {
                    Some(request) => self.handle(request),
                    None => accepting = false,
                },
            }
        }

        self.subscription.unsubscribe();
        debug!(
            staged = self.terminal.staged(),
            records = self.terminal.scrollback().len(),
            "console loop stopped"
        );
    }

    fn ingest(&mut self, line: PublishedLine) {
        let outcome = self
            .terminal
            .ingest_at(line.text, line.received_at, Instant::now());
        if outcome.progress_changed {
            let state = self.terminal.progress().cloned();
            self.emit(ConsoleEvent::Progress(state));
        }
        if let Some(report) = outcome.forced_flush {
            self.emit(ConsoleEvent::Appended {
                records: report.records,
                scroll: report.scroll,
            });
        }
    }

    fn flush(&mut self) {
        if let Some(report) = self.terminal.flush() {
            self.emit(ConsoleEvent::Appended {
                records: report.records,
                scroll: report.scroll,
            });
        }
    }

    fn handle(&mut self, request: ConsoleRequest) {
        match request {
            ConsoleRequest::Submit { command, reply } => {
                let outcome = self.submit(command);
                let _ = reply.send(outcome);
            }
            ConsoleRequest::SetChannel(channel) => {
                if self.terminal.set_channel(channel) {
                    debug!(channel = channel.label(), "filter channel changed");
                }
            }
            ConsoleRequest::Scroll(metrics) => {
                self.terminal.on_scroll(metrics);
            }
            ConsoleRequest::ScrollToBottom => {
                self.terminal.scroll_to_bottom();
            }
            ConsoleRequest::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn submit(&mut self, command: String) -> DispatchOutcome {
        self.terminal.set_input(command);
        let outcome = self.terminal.submit_command(self.backend.is_running());
        match &outcome {
            DispatchOutcome::Accepted { outbound, .. } => {
                if let Some(echo) = self.terminal.scrollback().latest().cloned() {
                    self.emit(ConsoleEvent::Appended {
                        records: vec![echo],
                        scroll: self.terminal.autoscroll().action(),
                    });
                }
                let outbound = outbound.clone();
                let backend = Arc::clone(&self.backend);
                let feedback = self.feedback_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = outbound.forward(backend.as_ref()).await {
                        warn!(
                            target_id = %outbound.target,
                            command = %outbound.command,
                            error = %err,
                            "command forward failed"
                        );
                        let _ = feedback.send(PublishedLine::now(format!("Error: {err}")));
                    }
                });
            }
            DispatchOutcome::Rejected(reason) => {
                debug!(?reason, "command rejected");
                self.emit(ConsoleEvent::CommandRejected(*reason));
            }
        }
        outcome
    }

    fn snapshot(&self) -> ConsoleSnapshot {
        let scrollback = self.terminal.scrollback();
        ConsoleSnapshot {
            channel: self.terminal.channel(),
            visible: self.terminal.visible().cloned().collect(),
            total: scrollback.len(),
            staged: self.terminal.staged(),
            revision: scrollback.revision(),
            progress: self.terminal.progress_at(Instant::now()).cloned(),
            pinned: self.terminal.autoscroll().is_pinned(),
            scroll: self.terminal.autoscroll().metrics(),
            input_enabled: self.backend.is_running(),
        }
    }

    fn emit(&self, event: ConsoleEvent) {
        let _ = self.events.send(event);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

//! The console state owner.
//!
//! `Terminal` holds the staging buffer, scrollback, progress tracker, view
//! filter, autoscroll controller, and command input. It is driven by exactly
//! one caller (the service loop or a test) so every mutation is serialized.

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ConsoleConfig;
use crate::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::progress::{ProgressState, ProgressTracker};
use crate::record::{LogRecord, Sequence};
use crate::scrollback::Scrollback;
use crate::staging::Ingestor;
use crate::view::{Autoscroll, FilterChannel, ScrollAction, ScrollMetrics, ViewFilter};

/// Result of merging staged lines into the scrollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Records appended, in arrival order.
    pub records: Vec<LogRecord>,
    /// Records evicted from the head to stay within capacity.
    pub evicted: usize,
    /// What the view should do about the growth.
    pub scroll: ScrollAction,
}

/// Result of ingesting a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub sequence: Sequence,
    pub progress_changed: bool,
    /// Set when staging crossed its threshold and was flushed immediately.
    pub forced_flush: Option<FlushReport>,
}

#[derive(Debug, Clone)]
pub struct Terminal {
    ingestor: Ingestor,
    scrollback: Scrollback,
    progress: ProgressTracker,
    view: ViewFilter,
    autoscroll: Autoscroll,
    dispatcher: CommandDispatcher,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new(&ConsoleConfig::default())
    }
}

impl Terminal {
    pub fn new(config: &ConsoleConfig) -> Self {
        let config = config.normalized();
        Self {
            ingestor: Ingestor::new(config.staging_flush_threshold),
            scrollback: Scrollback::new(config.scrollback_capacity),
            progress: ProgressTracker::new(
                config.progress_idle_timeout(),
                config.progress_completion_timeout(),
            ),
            view: ViewFilter::default(),
            autoscroll: Autoscroll::new(config.autoscroll_threshold),
            dispatcher: CommandDispatcher::new(config.prompt, config.target),
        }
    }

    // -- ingestion ----------------------------------------------------------

    /// Ingest a line stamped with the current wall clock.
    pub fn ingest(&mut self, text: impl Into<String>) -> IngestOutcome {
        self.ingest_at(text, Utc::now(), Instant::now())
    }

    /// Ingest a line received at `received_at`; `now` drives progress timers.
    pub fn ingest_at(
        &mut self,
        text: impl Into<String>,
        received_at: DateTime<Utc>,
        now: Instant,
    ) -> IngestOutcome {
        let text = text.into();
        let progress_changed = self.progress.observe(&text, now);
        let ingested = self.ingestor.ingest(text, received_at);
        let forced_flush = if ingested.over_threshold {
            warn!(
                staged = ingested.staged,
                threshold = self.ingestor.flush_threshold(),
                "staging over threshold; flushing early"
            );
            self.flush()
        } else {
            None
        };
        IngestOutcome {
            sequence: ingested.sequence,
            progress_changed,
            forced_flush,
        }
    }

    // -- flush --------------------------------------------------------------

    /// Merge everything staged into the scrollback. `None` when nothing was
    /// staged; the scrollback and view are then left untouched.
    pub fn flush(&mut self) -> Option<FlushReport> {
        let staged = self.ingestor.drain();
        if staged.is_empty() {
            return None;
        }
        let records: Vec<LogRecord> = staged.into_iter().map(LogRecord::from_staged).collect();
        let report = self.scrollback.append_batch(records.iter().cloned());
        let scroll = self.refresh_view();
        debug!(
            appended = report.appended,
            evicted = report.evicted,
            len = self.scrollback.len(),
            "flushed staging"
        );
        Some(FlushReport {
            records,
            evicted: report.evicted,
            scroll,
        })
    }

    // -- commands -----------------------------------------------------------

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.dispatcher.set_input(input);
    }

    pub fn input(&self) -> &str {
        self.dispatcher.input()
    }

    /// Submit the current input. An accepted command is echoed into the
    /// scrollback before this returns.
    pub fn submit_command(&mut self, running: bool) -> DispatchOutcome {
        self.submit_command_at(running, Utc::now())
    }

    pub fn submit_command_at(&mut self, running: bool, now: DateTime<Utc>) -> DispatchOutcome {
        let outcome = self
            .dispatcher
            .submit(running, &mut self.ingestor, &mut self.scrollback, now);
        if matches!(outcome, DispatchOutcome::Accepted { .. }) {
            self.refresh_view();
        }
        outcome
    }

    // -- progress -----------------------------------------------------------

    /// Apply idle expiry at `now`. Returns true when the state was cleared.
    pub fn tick_progress(&mut self, now: Instant) -> bool {
        let expired = self.progress.expire(now);
        if expired {
            debug!("sync progress expired");
        }
        expired
    }

    pub fn progress_at(&self, now: Instant) -> Option<&ProgressState> {
        self.progress.state_at(now)
    }

    pub fn progress(&self) -> Option<&ProgressState> {
        self.progress.current()
    }

    pub fn progress_deadline(&self) -> Option<Instant> {
        self.progress.next_deadline()
    }

    // -- view ---------------------------------------------------------------

    /// Switch the active filter. The scrollback is not touched.
    pub fn set_channel(&mut self, channel: FilterChannel) -> bool {
        let changed = self.view.set_channel(channel);
        if changed {
            self.refresh_view();
        }
        changed
    }

    pub fn channel(&self) -> FilterChannel {
        self.view.channel()
    }

    pub fn visible(&self) -> impl Iterator<Item = &LogRecord> {
        self.view.visible(&self.scrollback)
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        self.autoscroll.on_scroll(metrics)
    }

    pub fn scroll_to_bottom(&mut self) -> u32 {
        self.autoscroll.scroll_to_bottom()
    }

    pub fn autoscroll(&self) -> &Autoscroll {
        &self.autoscroll
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn staged(&self) -> usize {
        self.ingestor.staged()
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// One row per visible record.
    fn refresh_view(&mut self) -> ScrollAction {
        let height = u32::try_from(self.view.visible_count(&self.scrollback)).unwrap_or(u32::MAX);
        self.autoscroll.on_content_resized(height)
    }
}

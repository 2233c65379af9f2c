//! Operator command input: gating, local echo, and forwarding.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::backend::{BackendError, ConsoleBackend};
use crate::record::{LogRecord, Sequence};
use crate::scrollback::{AppendReport, Scrollback};
use crate::staging::Ingestor;

pub const DEFAULT_PROMPT: &str = "> ";

/// Why a submit did not go through. Rejections leave the input untouched
/// and are never written to the scrollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotRunning,
    Empty,
}

/// A command accepted locally, waiting to be handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub target: String,
    pub command: String,
    pub echo_sequence: Sequence,
}

impl OutboundCommand {
    /// Hand the command to `backend`.
    pub async fn forward<B>(&self, backend: &B) -> Result<(), BackendError>
    where
        B: ConsoleBackend + ?Sized,
    {
        backend.send_command(&self.target, &self.command).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted {
        outbound: OutboundCommand,
        report: AppendReport,
    },
    Rejected(RejectReason),
}

/// Input field plus the prompt and target it dispatches with.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    input: String,
    prompt: String,
    target: String,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT, "")
    }
}

impl CommandDispatcher {
    pub fn new(prompt: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            input: String::new(),
            prompt: prompt.into(),
            target: target.into(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Submit the current input.
    ///
    /// On accept the echo record is appended straight to `scrollback` with a
    /// fresh sequence from `ingestor`, ahead of anything still staged, and
    /// the input is cleared before the caller forwards the command. The echo
    /// shows the trimmed command; the backend receives the input as typed.
    pub fn submit(
        &mut self,
        running: bool,
        ingestor: &mut Ingestor,
        scrollback: &mut Scrollback,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        if !running {
            return DispatchOutcome::Rejected(RejectReason::NotRunning);
        }
        if self.input.trim().is_empty() {
            return DispatchOutcome::Rejected(RejectReason::Empty);
        }

        let echo_sequence = ingestor.next_sequence();
        let echo = LogRecord::echo(
            echo_sequence,
            now,
            format!("{}{}", self.prompt, self.input.trim()),
        );
        let report = scrollback.push(echo);
        let command = std::mem::take(&mut self.input);
        debug!(sequence = echo_sequence, target = %self.target, "command echoed");

        DispatchOutcome::Accepted {
            outbound: OutboundCommand {
                target: self.target.clone(),
                command,
                echo_sequence,
            },
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandDispatcher, DispatchOutcome, RejectReason};
    use crate::classify::Tag;
    use crate::scrollback::Scrollback;
    use crate::staging::Ingestor;
    use chrono::Utc;

    #[test]
    fn rejects_when_backend_not_running() {
        let mut dispatcher = CommandDispatcher::new("> ", "srv");
        let mut ingestor = Ingestor::default();
        let mut scrollback = Scrollback::new(8);
        dispatcher.set_input("list");

        let outcome = dispatcher.submit(false, &mut ingestor, &mut scrollback, Utc::now());

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::NotRunning));
        assert_eq!(dispatcher.input(), "list");
        assert!(scrollback.is_empty());
    }

    #[test]
    fn rejects_blank_input() {
        let mut dispatcher = CommandDispatcher::default();
        let mut ingestor = Ingestor::default();
        let mut scrollback = Scrollback::new(8);
        dispatcher.set_input("   ");

        let outcome = dispatcher.submit(true, &mut ingestor, &mut scrollback, Utc::now());

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::Empty));
        assert!(scrollback.is_empty());
    }

    #[test]
    fn accepted_command_is_echoed_ahead_of_staged_lines() {
        let mut dispatcher = CommandDispatcher::new("> ", "srv-1");
        let mut ingestor = Ingestor::default();
        let mut scrollback = Scrollback::new(8);
        let now = Utc::now();
        ingestor.ingest("[MC]: still staged", now);
        dispatcher.set_input(" say hi ");

        let outcome = dispatcher.submit(true, &mut ingestor, &mut scrollback, now);
        let outbound = match outcome {
            DispatchOutcome::Accepted { outbound, report } => {
                assert_eq!(report.appended, 1);
                outbound
            }
            other => panic!("expected accept, got {other:?}"),
        };

        assert_eq!(outbound.target, "srv-1");
        assert_eq!(outbound.command, " say hi ");
        assert_eq!(outbound.echo_sequence, 2);
        assert_eq!(dispatcher.input(), "");
        assert_eq!(ingestor.staged(), 1);

        let echo = match scrollback.latest() {
            Some(record) => record,
            None => panic!("echo missing"),
        };
        assert_eq!(echo.text(), "> say hi");
        assert_eq!(echo.tag(), Tag::LocalEcho);
        assert!(echo.is_echo());
        assert_eq!(echo.received_at(), now);
    }
}

//! Scrollback record model.
//!
//! A [`LogRecord`] is created once (at flush time for backend lines, at submit
//! time for local echoes) and never mutated afterwards. Its `sequence` is
//! assigned at arrival, so ordering by sequence reflects true arrival order
//! even when an echo is placed ahead of lines that were still staged.

use chrono::{DateTime, Utc};

use crate::classify::{classify, Tag};

/// Monotonic arrival id.
pub type Sequence = u64;

/// A line captured at arrival but not yet merged into the scrollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLine {
    pub sequence: Sequence,
    pub received_at: DateTime<Utc>,
    pub text: String,
}

/// A classified, immutable scrollback entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    sequence: Sequence,
    received_at: DateTime<Utc>,
    text: String,
    tag: Tag,
    is_echo: bool,
}

impl LogRecord {
    /// Classify a staged backend line into a record.
    #[must_use]
    pub fn from_staged(line: StagedLine) -> Self {
        let tag = classify(&line.text);
        Self {
            sequence: line.sequence,
            received_at: line.received_at,
            text: line.text,
            tag,
            is_echo: false,
        }
    }

    /// Build a local echo record for an operator command.
    #[must_use]
    pub fn echo(sequence: Sequence, received_at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            sequence,
            received_at,
            text: text.into(),
            tag: Tag::LocalEcho,
            is_echo: true,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[must_use]
    pub fn is_echo(&self) -> bool {
        self.is_echo
    }
}

/// Hands out arrival sequence numbers, starting at 1.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    last: Sequence,
}

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence(&mut self) -> Sequence {
        self.last = self.last.saturating_add(1);
        self.last
    }

    /// The most recently issued sequence (0 before the first call).
    #[must_use]
    pub fn last(&self) -> Sequence {
        self.last
    }
}

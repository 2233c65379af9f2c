//! Event ingestion and the staging buffer.
//!
//! The [`Ingestor`] stamps each pushed line with its arrival time and
//! sequence and appends it to the [`StagingBuffer`]. Staged lines stay
//! invisible until the flush scheduler drains them into the scrollback.

use chrono::{DateTime, Utc};

use crate::record::{Sequence, SequenceCounter, StagedLine};

/// Staged line count past which the owner should flush immediately instead
/// of waiting for the next tick.
pub const DEFAULT_STAGING_FLUSH_THRESHOLD: usize = 10_000;

/// Ordered holding area for lines received since the last flush.
#[derive(Debug, Clone, Default)]
pub struct StagingBuffer {
    lines: Vec<StagedLine>,
}

impl StagingBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: StagedLine) {
        self.lines.push(line);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Take every staged line in arrival order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<StagedLine> {
        std::mem::take(&mut self.lines)
    }
}

/// Outcome of ingesting one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    pub sequence: Sequence,
    /// Staged line count after the append.
    pub staged: usize,
    /// Whether the staging buffer crossed the sanity threshold.
    pub over_threshold: bool,
}

/// Receives raw lines and stages them with their arrival stamp.
#[derive(Debug, Clone)]
pub struct Ingestor {
    staging: StagingBuffer,
    sequences: SequenceCounter,
    flush_threshold: usize,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_FLUSH_THRESHOLD)
    }
}

impl Ingestor {
    #[must_use]
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            staging: StagingBuffer::new(),
            sequences: SequenceCounter::new(),
            flush_threshold: flush_threshold.max(1),
        }
    }

    /// Stage a line received at `received_at`. Accepts any text verbatim.
    pub fn ingest(&mut self, text: impl Into<String>, received_at: DateTime<Utc>) -> Ingested {
        let sequence = self.sequences.next_sequence();
        self.staging.push(StagedLine {
            sequence,
            received_at,
            text: text.into(),
        });
        let staged = self.staging.len();
        Ingested {
            sequence,
            staged,
            over_threshold: staged >= self.flush_threshold,
        }
    }

    /// Stage a raw byte line, decoding it lossily.
    pub fn ingest_bytes(&mut self, raw: &[u8], received_at: DateTime<Utc>) -> Ingested {
        self.ingest(String::from_utf8_lossy(raw).into_owned(), received_at)
    }

    /// Reserve the next sequence for a record that bypasses staging.
    pub fn next_sequence(&mut self) -> Sequence {
        self.sequences.next_sequence()
    }

    #[must_use]
    pub fn staged(&self) -> usize {
        self.staging.len()
    }

    #[must_use]
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    pub(crate) fn drain(&mut self) -> Vec<StagedLine> {
        self.staging.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::{Ingestor, StagingBuffer};
    use crate::record::StagedLine;
    use chrono::{Duration, Utc};

    #[test]
    fn ingest_keeps_distinct_arrival_times_and_order() {
        let mut ingestor = Ingestor::new(100);
        let first = Utc::now();
        let second = first + Duration::milliseconds(3);
        ingestor.ingest("one", first);
        ingestor.ingest("two", second);

        let lines = ingestor.drain();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "one");
        assert_eq!(lines[0].received_at, first);
        assert_eq!(lines[1].text, "two");
        assert_eq!(lines[1].received_at, second);
        assert!(lines[0].sequence < lines[1].sequence);
        assert_eq!(ingestor.staged(), 0);
    }

    #[test]
    fn ingest_accepts_degenerate_text_verbatim() {
        let mut ingestor = Ingestor::default();
        let now = Utc::now();
        ingestor.ingest("", now);
        ingestor.ingest_bytes(&[0x66, 0x6f, 0xff], now);
        ingestor.ingest("y".repeat(100_000), now);

        let lines = ingestor.drain();
        assert_eq!(lines[0].text, "");
        assert_eq!(lines[1].text, "fo\u{fffd}");
        assert_eq!(lines[2].text.len(), 100_000);
    }

    #[test]
    fn threshold_is_reported_once_reached() {
        let mut ingestor = Ingestor::new(2);
        let now = Utc::now();
        assert!(!ingestor.ingest("a", now).over_threshold);
        assert!(ingestor.ingest("b", now).over_threshold);
    }

    #[test]
    fn next_sequence_interleaves_with_staged_lines() {
        let mut ingestor = Ingestor::new(10);
        let now = Utc::now();
        let staged = ingestor.ingest("line", now).sequence;
        let echo = ingestor.next_sequence();
        assert_eq!(echo, staged + 1);
    }

    #[test]
    fn staging_drain_empties_buffer() {
        let mut staging = StagingBuffer::new();
        staging.push(StagedLine {
            sequence: 1,
            received_at: Utc::now(),
            text: "x".to_owned(),
        });
        assert_eq!(staging.len(), 1);
        assert_eq!(staging.drain().len(), 1);
        assert!(staging.is_empty());
    }
}

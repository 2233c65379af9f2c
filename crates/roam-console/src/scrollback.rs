//! Fixed-capacity scrollback ring with strict FIFO eviction.

use std::collections::VecDeque;

use crate::record::LogRecord;

pub const DEFAULT_SCROLLBACK_CAPACITY: usize = 1000;
/// Largest capacity a config may ask for.
pub const MAX_SCROLLBACK_CAPACITY: usize = 1_000_000;
/// Storage reserved up front; larger rings grow as records arrive.
const PREALLOCATE_LIMIT: usize = 4096;

/// Counts from one append operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendReport {
    pub appended: usize,
    pub evicted: usize,
}

/// Ordered, bounded history of classified records.
///
/// `len() <= capacity()` holds after every mutation. Eviction always removes
/// the oldest record first.
#[derive(Debug, Clone)]
pub struct Scrollback {
    capacity: usize,
    records: VecDeque<LogRecord>,
    revision: u64,
    appended_total: u64,
    evicted_total: u64,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK_CAPACITY)
    }
}

impl Scrollback {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            revision: 0,
            appended_total: 0,
            evicted_total: 0,
        }
    }

    /// Append records at the tail in the given order, evicting from the head
    /// as needed. An empty batch leaves the scrollback untouched.
    pub fn append_batch<I>(&mut self, records: I) -> AppendReport
    where
        I: IntoIterator<Item = LogRecord>,
    {
        let mut report = AppendReport::default();
        for record in records {
            if self.records.len() == self.capacity {
                self.records.pop_front();
                report.evicted += 1;
            }
            self.records.push_back(record);
            report.appended += 1;
        }
        if report.appended > 0 {
            self.revision = self.revision.wrapping_add(1);
            self.appended_total = self.appended_total.saturating_add(report.appended as u64);
            self.evicted_total = self.evicted_total.saturating_add(report.evicted as u64);
        }
        report
    }

    /// Append a single record.
    pub fn push(&mut self, record: LogRecord) -> AppendReport {
        self.append_batch(std::iter::once(record))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every non-empty append.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn appended_total(&self) -> u64 {
        self.appended_total
    }

    #[must_use]
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogRecord> + ExactSizeIterator {
        self.records.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&LogRecord> {
        self.records.back()
    }

    /// The newest `count` records, oldest first.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = &LogRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppendReport, Scrollback};
    use crate::record::LogRecord;
    use chrono::Utc;

    fn record(sequence: u64) -> LogRecord {
        LogRecord::echo(sequence, Utc::now(), format!("line {sequence}"))
    }

    fn sequences(scrollback: &Scrollback) -> Vec<u64> {
        scrollback.iter().map(LogRecord::sequence).collect()
    }

    #[test]
    fn overflow_keeps_last_capacity_records_in_order() {
        let mut scrollback = Scrollback::new(3);
        for sequence in 1..=10 {
            scrollback.push(record(sequence));
            assert!(scrollback.len() <= 3);
        }
        assert_eq!(sequences(&scrollback), vec![8, 9, 10]);
        assert_eq!(scrollback.evicted_total(), 7);
        assert_eq!(scrollback.appended_total(), 10);
    }

    #[test]
    fn batch_larger_than_capacity_keeps_tail_of_batch() {
        let mut scrollback = Scrollback::new(4);
        scrollback.push(record(1));
        let report = scrollback.append_batch((2..=9).map(record));
        assert_eq!(
            report,
            AppendReport {
                appended: 8,
                evicted: 5
            }
        );
        assert_eq!(sequences(&scrollback), vec![6, 7, 8, 9]);
    }

    #[test]
    fn empty_batch_is_identity() {
        let mut scrollback = Scrollback::new(2);
        scrollback.push(record(1));
        let before = scrollback.revision();
        let report = scrollback.append_batch(Vec::new());
        assert_eq!(report, AppendReport::default());
        assert_eq!(scrollback.revision(), before);
        assert_eq!(sequences(&scrollback), vec![1]);
    }

    #[test]
    fn huge_capacity_does_not_reserve_storage_up_front() {
        let mut scrollback = Scrollback::new(usize::MAX / 64);
        assert_eq!(scrollback.capacity(), usize::MAX / 64);
        assert!(scrollback.is_empty());
        let report = scrollback.push(record(1));
        assert_eq!(report.appended, 1);
        assert_eq!(report.evicted, 0);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut scrollback = Scrollback::new(0);
        scrollback.push(record(1));
        scrollback.push(record(2));
        assert_eq!(scrollback.capacity(), 1);
        assert_eq!(sequences(&scrollback), vec![2]);
    }

    #[test]
    fn tail_returns_newest_records_oldest_first() {
        let mut scrollback = Scrollback::new(10);
        scrollback.append_batch((1..=5).map(record));
        let tail: Vec<u64> = scrollback.tail(2).map(LogRecord::sequence).collect();
        assert_eq!(tail, vec![4, 5]);
        let all: Vec<u64> = scrollback.tail(99).map(LogRecord::sequence).collect();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(scrollback.latest().map(LogRecord::sequence), Some(5));
    }
}

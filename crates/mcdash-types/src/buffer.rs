use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::{LogRecord, Severity};

/// Default number of records a viewer retains
pub const DEFAULT_CAPACITY: usize = 1000;

/// Lock-free atomic counters for each severity
#[derive(Default)]
struct AtomicSeverityCounts {
    info: AtomicUsize,
    warn: AtomicUsize,
    error: AtomicUsize,
    system: AtomicUsize,
    unknown: AtomicUsize,
}

impl AtomicSeverityCounts {
    fn slot(&self, severity: Severity) -> &AtomicUsize {
        match severity {
            Severity::Info => &self.info,
            Severity::Warn => &self.warn,
            Severity::Error => &self.error,
            Severity::System => &self.system,
            Severity::Unknown => &self.unknown,
        }
    }

    fn increment(&self, severity: Severity) {
        self.slot(severity).fetch_add(1, Ordering::Relaxed);
    }

    fn decrement(&self, severity: Severity) {
        self.slot(severity).fetch_sub(1, Ordering::Relaxed);
    }

    fn to_counts(&self) -> SeverityCounts {
        SeverityCounts {
            info: self.info.load(Ordering::Relaxed),
            warn: self.warn.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            system: self.system.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }
}

/// Consumer-side ring buffer of received records
///
/// Keeps the most recent `capacity` records, skips a record whose exact
/// payload is already retained, and can export what it holds as plain text.
#[derive(Clone)]
pub struct RecordBuffer {
    entries: Arc<RwLock<VecDeque<LogRecord>>>,
    capacity: usize,
    counts: Arc<AtomicSeverityCounts>,
}

impl RecordBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            counts: Arc::new(AtomicSeverityCounts::default()),
        }
    }

    /// Append a record, evicting the oldest at capacity
    ///
    /// Returns false when an identical record is already retained.
    pub fn push(&self, record: LogRecord) -> bool {
        let mut entries = self.entries.write();
        if entries.contains(&record) {
            return false;
        }
        if entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                self.counts.decrement(evicted.severity);
            }
        }
        self.counts.increment(record.severity);
        entries.push_back(record);
        true
    }

    /// Decode a wire payload and append it
    pub fn push_payload(&self, payload: &str) -> bool {
        self.push(LogRecord::from_payload(payload))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn counts(&self) -> SeverityCounts {
        self.counts.to_counts()
    }

    /// Export retained log lines, engine notices excluded
    pub fn export_raw(&self) -> String {
        self.entries
            .read()
            .iter()
            .filter(|r| !r.is_system())
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Counts per severity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub system: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.info + self.warn + self.error + self.system + self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(text: &str) -> LogRecord {
        LogRecord::new(Severity::Info, text)
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let buffer = RecordBuffer::new(3);
        for i in 0..5 {
            buffer.push(info(&format!("line {i}")));
        }
        assert_eq!(buffer.export_raw(), "line 2\nline 3\nline 4");
        assert_eq!(buffer.counts().info, 3);
    }

    #[test]
    fn test_skips_duplicates() {
        let buffer = RecordBuffer::new(10);
        assert!(buffer.push(info("same")));
        assert!(!buffer.push(info("same")));
        assert!(buffer.push(LogRecord::new(Severity::Warn, "same")));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_counts_track_evictions() {
        let buffer = RecordBuffer::new(2);
        buffer.push(LogRecord::new(Severity::Error, "a"));
        buffer.push(LogRecord::new(Severity::Warn, "b"));
        buffer.push(LogRecord::system("c"));
        let counts = buffer.counts();
        assert_eq!(counts.error, 0);
        assert_eq!(counts.warn, 1);
        assert_eq!(counts.system, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_push_payload_keeps_malformed_as_unknown() {
        let buffer = RecordBuffer::default();
        buffer.push_payload(r#"{"level":"INFO","content":"Hello"}"#);
        buffer.push_payload(r#"[1,2,3]"#);
        assert_eq!(buffer.counts().info, 1);
        assert_eq!(buffer.counts().unknown, 1);
        assert_eq!(buffer.export_raw(), "Hello\n[1,2,3]");
    }

    #[test]
    fn test_export_skips_notices() {
        let buffer = RecordBuffer::default();
        buffer.push(LogRecord::system("Waiting for new log entries..."));
        buffer.push(info("first"));
        buffer.push(LogRecord::new(Severity::Error, "second"));
        assert_eq!(buffer.export_raw(), "first\nsecond");
        assert_eq!(buffer.counts().total(), 3);
    }
}

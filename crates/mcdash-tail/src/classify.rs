use std::borrow::Cow;

use mcdash_types::{ERROR_MARKER, INFO_MARKER, LevelFilter, LogRecord, Severity, WARN_MARKER};

/// Classify a raw line by its severity marker
///
/// Precedence is ERROR, then WARN, then INFO. A line without any marker is
/// reported as INFO but never passes a filter.
pub fn classify(line: &str) -> Severity {
    if line.contains(ERROR_MARKER) {
        Severity::Error
    } else if line.contains(WARN_MARKER) {
        Severity::Warn
    } else {
        Severity::Info
    }
}

fn has_any_marker(line: &str) -> bool {
    line.contains(INFO_MARKER) || line.contains(WARN_MARKER) || line.contains(ERROR_MARKER)
}

/// Whether `line` passes `filter`
///
/// Matching is on the exact marker, not a severity threshold: an `ERROR`
/// line is withheld from an `INFO` subscriber, and a line carrying both
/// `/INFO]` and `/ERROR]` passes both filters.
pub fn accepts(line: &str, filter: LevelFilter) -> bool {
    match filter.marker() {
        Some(marker) => line.contains(marker),
        None => has_any_marker(line),
    }
}

/// Escape embedded newlines so a record is always a single wire line
pub fn escape_newlines(line: &str) -> Cow<'_, str> {
    if line.contains('\n') {
        Cow::Owned(line.replace('\n', "\\n"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Classify and filter one raw line into a deliverable record
pub fn filter_line(line: &str, filter: LevelFilter) -> Option<LogRecord> {
    if !accepts(line, filter) {
        return None;
    }
    Some(LogRecord::new(classify(line), escape_newlines(line)))
}

/// Filter a chunk of raw lines, keeping file order
pub fn filter_lines<I, S>(lines: I, filter: LevelFilter) -> Vec<LogRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| filter_line(line.as_ref(), filter))
        .collect()
}

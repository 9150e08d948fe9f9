//! Flattening Loki stream results into individual log entries.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{from_nanos, Labels, QueryResponse, QueryResult, Stream};

/// A single log entry from Loki
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Timestamp of the log entry
    pub timestamp: DateTime<Utc>,
    /// The log line content
    pub line: String,
    /// Labels of the stream the entry came from
    pub labels: Labels,
}

/// Flatten streams into entries sorted oldest first.
///
/// Values whose timestamp is not a nanosecond epoch are dropped.
#[must_use]
pub fn flatten_streams(streams: &[Stream]) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = streams
        .iter()
        .flat_map(|stream| {
            stream.values.iter().filter_map(move |(ts, line)| {
                from_nanos(ts).map(|timestamp| LogEntry {
                    timestamp,
                    line: line.clone(),
                    labels: stream.stream.clone(),
                })
            })
        })
        .collect();

    // Stable, so entries sharing a timestamp keep their stream order.
    entries.sort_by_key(|e| e.timestamp);
    entries
}

impl QueryResponse {
    /// Log entries of a `streams` result, oldest first. Empty for metric or error results.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.data.as_ref().map(|d| &d.result) {
            Some(QueryResult::Streams(streams)) => flatten_streams(streams),
            _ => Vec::new(),
        }
    }
}

/// Entries whose line looks like an error report.
#[must_use]
pub fn error_lines(entries: &[LogEntry]) -> Vec<&LogEntry> {
    entries
        .iter()
        .filter(|e| {
            let line_lower = e.line.to_lowercase();
            line_lower.contains("error")
                || line_lower.contains("fatal")
                || line_lower.contains("panic")
                || line_lower.contains("failed")
                || line_lower.contains("exception")
        })
        .collect()
}

/// Render entries as `[time] line`, one per line.
///
/// With `max_lines > 0` only the most recent `max_lines` entries are shown.
#[must_use]
pub fn format_entries(entries: &[LogEntry], max_lines: usize) -> String {
    if entries.is_empty() {
        return "No logs available.\n".to_string();
    }

    let mut output = String::new();
    let total = entries.len();

    let shown: &[LogEntry] = if max_lines > 0 && total > max_lines {
        let _ = writeln!(output, "(showing last {max_lines} of {total} entries)");
        &entries[total - max_lines..]
    } else {
        entries
    };

    for entry in shown {
        let time = entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let _ = writeln!(output, "[{time}] {}", entry.line);
    }

    output
}

//! Watermark diffing over repeated full log snapshots.
//!
//! The log endpoint returns the whole (bounded, rotating) buffer of a stream
//! on every poll and offers no cursor. The tracker remembers the newest entry
//! it has seen per stream and only counts entries after it on the next poll.
//! When the remembered entry has rotated out of the buffer, every entry is
//! counted again: over-counting after heavy rotation is preferred to
//! silently dropping entries.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::LogEntry;

/// Identity of a log entry. The message is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPosition {
    pub time: DateTime<Utc>,
    pub module: String,
    pub level: String,
}

impl LogPosition {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.time == self.time && entry.module == self.module && entry.level == self.level
    }
}

impl From<&LogEntry> for LogPosition {
    fn from(entry: &LogEntry) -> Self {
        Self {
            time: entry.time,
            module: entry.module.clone(),
            level: entry.level.clone(),
        }
    }
}

/// Counter key: stream name, module and lowercased level.
pub type CounterKey = (String, String, String);

#[derive(Debug, Default)]
struct State {
    watermarks: HashMap<String, LogPosition>,
    totals: BTreeMap<CounterKey, u64>,
}

/// Long-lived watermark and counter state shared by all log polls.
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    state: Mutex<State>,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the entries of `stream` not reported by a previous poll.
    ///
    /// `entries` is the full current buffer, oldest first. Returns the number
    /// of entries counted as new. An empty buffer leaves the state untouched.
    pub fn observe(&self, stream: &str, entries: &[LogEntry]) -> usize {
        let Some(newest) = entries.last() else {
            return 0;
        };

        let mut state = self.state.lock();

        let start = state
            .watermarks
            .get(stream)
            .and_then(|seen| entries.iter().position(|e| seen.matches(e)))
            .map_or(0, |idx| idx + 1);

        let fresh = &entries[start..];
        for entry in fresh {
            let key = (
                stream.to_string(),
                entry.module.clone(),
                entry.level.to_lowercase(),
            );
            *state.totals.entry(key).or_default() += 1;
        }

        state
            .watermarks
            .insert(stream.to_string(), LogPosition::from(newest));

        fresh.len()
    }

    /// Current watermark of `stream`, if it was ever polled with entries.
    pub fn watermark(&self, stream: &str) -> Option<LogPosition> {
        self.state.lock().watermarks.get(stream).cloned()
    }

    /// Snapshot of all counters, sorted by key.
    pub fn totals(&self) -> Vec<(CounterKey, u64)> {
        self.state
            .lock()
            .totals
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(day: u32, module: &str, level: &str, message: &str) -> LogEntry {
        LogEntry {
            time: Utc.with_ymd_and_hms(2020, 3, day, 0, 0, 0).single().unwrap(),
            level: level.to_string(),
            module: module.to_string(),
            message: message.to_string(),
        }
    }

    fn total(tracker: &WatermarkTracker, stream: &str, module: &str, level: &str) -> u64 {
        tracker
            .totals()
            .into_iter()
            .find(|((s, m, l), _)| s == stream && m == module && l == level)
            .map_or(0, |(_, v)| v)
    }

    #[test]
    fn test_first_poll_counts_everything() {
        let tracker = WatermarkTracker::new();
        let entries = vec![
            entry(1, "storage", "INFO", "a"),
            entry(2, "storage", "INFO", "b"),
        ];

        assert_eq!(tracker.observe("server", &entries), 2);
        assert_eq!(total(&tracker, "server", "storage", "info"), 2);
    }

    #[test]
    fn test_unchanged_buffer_counts_nothing() {
        let tracker = WatermarkTracker::new();
        let entries = vec![
            entry(1, "storage", "INFO", "a"),
            entry(2, "storage", "INFO", "b"),
        ];

        assert_eq!(tracker.observe("server", &entries), 2);
        assert_eq!(tracker.observe("server", &entries), 0);
        assert_eq!(tracker.observe("server", &entries), 0);
        assert_eq!(total(&tracker, "server", "storage", "info"), 2);
    }

    #[test]
    fn test_appended_entries_are_counted_once() {
        let tracker = WatermarkTracker::new();
        let mut entries = vec![entry(1, "storage", "INFO", "a")];
        tracker.observe("server", &entries);

        entries.push(entry(2, "consumer", "ERROR", "b"));
        entries.push(entry(3, "consumer", "Error", "c"));

        assert_eq!(tracker.observe("server", &entries), 2);
        assert_eq!(total(&tracker, "server", "consumer", "error"), 2);
        assert_eq!(total(&tracker, "server", "storage", "info"), 1);
    }

    #[test]
    fn test_rotation_recounts_all_entries() {
        let tracker = WatermarkTracker::new();
        tracker.observe(
            "server",
            &[entry(1, "storage", "INFO", "a"), entry(2, "storage", "INFO", "b")],
        );

        // Watermark (day 2) rotated out; day 3 and 4 are new, day 1 was
        // already counted but is counted again.
        let rotated = vec![
            entry(3, "storage", "INFO", "c"),
            entry(4, "storage", "INFO", "d"),
            entry(1, "storage", "INFO", "a"),
        ];
        assert_eq!(tracker.observe("server", &rotated), 3);
        assert_eq!(total(&tracker, "server", "storage", "info"), 5);

        assert_eq!(
            tracker.watermark("server"),
            Some(LogPosition::from(&rotated[2]))
        );
    }

    #[test]
    fn test_empty_buffer_keeps_watermark() {
        let tracker = WatermarkTracker::new();
        let entries = vec![entry(1, "storage", "INFO", "a")];
        tracker.observe("server", &entries);

        assert_eq!(tracker.observe("server", &[]), 0);
        assert_eq!(tracker.watermark("server"), Some(LogPosition::from(&entries[0])));
        assert_eq!(tracker.observe("server", &entries), 0);
    }

    #[test]
    fn test_message_is_not_part_of_identity() {
        let tracker = WatermarkTracker::new();
        tracker.observe("server", &[entry(1, "storage", "INFO", "original")]);

        let edited = vec![
            entry(1, "storage", "INFO", "different text"),
            entry(2, "storage", "INFO", "next"),
        ];
        assert_eq!(tracker.observe("server", &edited), 1);
    }

    #[test]
    fn test_first_match_wins_on_duplicate_identity() {
        let tracker = WatermarkTracker::new();
        tracker.observe("server", &[entry(1, "storage", "INFO", "a")]);

        let entries = vec![
            entry(1, "storage", "INFO", "a"),
            entry(1, "storage", "INFO", "same second"),
            entry(2, "storage", "INFO", "b"),
        ];
        assert_eq!(tracker.observe("server", &entries), 2);
    }

    #[test]
    fn test_streams_are_independent() {
        let tracker = WatermarkTracker::new();
        let entries = vec![entry(1, "storage", "INFO", "a")];

        assert_eq!(tracker.observe("server", &entries), 1);
        assert_eq!(tracker.observe("db", &entries), 1);
        assert_eq!(tracker.observe("server", &entries), 0);

        assert_eq!(total(&tracker, "server", "storage", "info"), 1);
        assert_eq!(total(&tracker, "db", "storage", "info"), 1);
        assert_eq!(tracker.watermark("mail"), None);
    }
}

//! Log line parsing.
//!
//! `/api/logs/{name}/` returns raw lines such as
//! `[2024-01-15 10:23:45,123] [INFO] [paperless.consumer] Consuming foo.pdf`.
//! Multi-line messages (tracebacks) continue on lines without that header.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use super::types::LogEntry;

const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S,%3f", "%Y-%m-%d %H:%M:%S"];

fn header_regex() -> &'static Regex {
    static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();

    HEADER_REGEX.get_or_init(|| {
        Regex::new(r"^\[(?P<time>[^\]]+)\]\s+\[(?P<level>[^\]]*)\]\s+\[(?P<module>[^\]]*)\]\s?(?P<message>.*)$")
            .expect("failed to compile log header regex")
    })
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse raw log lines into entries, oldest first.
///
/// Lines without a header are appended to the previous entry's message;
/// leading lines that cannot be attributed to any entry are dropped.
pub fn parse_log_lines<I, S>(lines: I) -> Vec<LogEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entries: Vec<LogEntry> = Vec::new();

    for line in lines {
        let line = line.as_ref();

        let header = header_regex()
            .captures(line)
            .and_then(|caps| {
                let time = parse_time(caps.name("time")?.as_str())?;
                Some((caps, time))
            });

        match header {
            Some((caps, time)) => entries.push(LogEntry {
                time,
                level: caps["level"].to_string(),
                module: caps["module"].to_string(),
                message: caps["message"].to_string(),
            }),
            None => {
                if let Some(last) = entries.last_mut() {
                    last.message.push('\n');
                    last.message.push_str(line);
                } else {
                    tracing::trace!(line, "Dropping log line without header");
                }
            }
        }
    }

    entries
}

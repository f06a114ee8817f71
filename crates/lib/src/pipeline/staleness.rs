//! Staleness filter: messages older than the window are not answered.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Result of checking a message timestamp against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Older than the window by `age`.
    Stale { age: Duration },
    /// Timestamp could not be parsed; filtering is skipped.
    Unparseable,
}

/// Parse a platform timestamp (unix seconds, surrounding whitespace allowed).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Classify `raw` relative to `now`. Timestamps in the future count as fresh.
pub fn classify(raw: &str, now: DateTime<Utc>, window: Duration) -> Freshness {
    let Some(sent_at) = parse_timestamp(raw) else {
        log::warn!("pipeline: could not parse timestamp {:?}, skipping staleness check", raw);
        return Freshness::Unparseable;
    };
    let age = match (now - sent_at).to_std() {
        Ok(age) => age,
        Err(_) => return Freshness::Fresh,
    };
    if age > window {
        Freshness::Stale { age }
    } else {
        Freshness::Fresh
    }
}

//! Last-activity tracking.
//!
//! A single timestamp — the time of the most recently logged message —
//! shared between the conversation log (writer) and the condition
//! evaluator (reader). Owning it in one handle keeps the single-writer
//! discipline explicit instead of a free-floating global.

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;

#[derive(Clone)]
pub struct ActivityTracker {
    last: Arc<RwLock<Option<DateTime<Local>>>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        ActivityTracker {
            last: Arc::new(RwLock::new(None)),
        }
    }

    /// Record a message timestamp. Older timestamps never move the clock
    /// backwards.
    pub fn record(&self, at: DateTime<Local>) {
        let mut last = self.last.write();
        if last.map_or(true, |prev| at > prev) {
            *last = Some(at);
        }
    }

    /// Time of the last recorded message, if any.
    pub fn last_activity(&self) -> Option<DateTime<Local>> {
        *self.last.read()
    }

    /// Whole seconds since the last recorded message.
    pub fn elapsed_seconds(&self, now: DateTime<Local>) -> Option<i64> {
        self.last_activity().map(|last| now.signed_duration_since(last).num_seconds())
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn starts_empty_and_records_latest() {
        let tracker = ActivityTracker::new();
        assert!(tracker.last_activity().is_none());

        let earlier = Local.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let later = Local.with_ymd_and_hms(2025, 6, 3, 11, 0, 0).unwrap();

        tracker.record(later);
        tracker.record(earlier);
        assert_eq!(tracker.last_activity(), Some(later));
    }

    #[test]
    fn clones_share_state() {
        let tracker = ActivityTracker::new();
        let handle = tracker.clone();
        let at = Local.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        handle.record(at);
        assert_eq!(tracker.last_activity(), Some(at));
    }
}

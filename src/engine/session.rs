use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tokio::task::AbortHandle;

use crate::engine::clock;

/// An open session on a site
#[derive(Debug)]
struct OpenSession {
    started_at: NaiveDateTime,
    guard: Option<AbortHandle>,
}

/// A closed session ready for usage accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSession {
    pub site: String,
    pub started_at: NaiveDateTime,

    /// Week bucket of the session start
    pub week: NaiveDate,

    /// Whole elapsed minutes, floored, never negative
    pub elapsed_minutes: u64,
}

/// Tracks at most one open session per site
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<String, OpenSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for a site
    ///
    /// Returns false (no-op) if one is already open, so duplicate start
    /// signals from repeated page loads never double-count.
    pub fn begin(&mut self, site: &str, now: NaiveDateTime) -> bool {
        if self.sessions.contains_key(site) {
            return false;
        }

        self.sessions.insert(
            site.to_string(),
            OpenSession {
                started_at: now,
                guard: None,
            },
        );
        true
    }

    /// Attach the max-session guard to an open session
    ///
    /// If the session was already closed in the meantime, the guard is
    /// aborted immediately instead.
    pub fn attach_guard(&mut self, site: &str, guard: AbortHandle) {
        match self.sessions.get_mut(site) {
            Some(session) => session.guard = Some(guard),
            None => guard.abort(),
        }
    }

    /// Close a site's session, cancelling its guard
    ///
    /// Returns `None` (no-op) if no session is open, which makes the
    /// explicit stop and the guard firing safely interchangeable.
    pub fn end(&mut self, site: &str, now: NaiveDateTime) -> Option<ClosedSession> {
        let session = self.sessions.remove(site)?;

        if let Some(guard) = session.guard {
            guard.abort();
        }

        let elapsed = (now - session.started_at).num_minutes().max(0) as u64;

        Some(ClosedSession {
            site: site.to_string(),
            started_at: session.started_at,
            week: clock::week_id(session.started_at),
            elapsed_minutes: elapsed,
        })
    }

    pub fn is_open(&self, site: &str) -> bool {
        self.sessions.contains_key(site)
    }

    pub fn open_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sites with an open session, for the periodic sweep
    pub fn open_sites(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_begin_opens_one_session() {
        let mut tracker = SessionTracker::new();

        assert!(tracker.begin("youtube.com", at(10, 0)));
        assert!(tracker.is_open("youtube.com"));
        assert_eq!(tracker.open_count(), 1);
    }

    #[test]
    fn test_double_begin_is_noop() {
        let mut tracker = SessionTracker::new();

        assert!(tracker.begin("youtube.com", at(10, 0)));
        assert!(!tracker.begin("youtube.com", at(10, 5)));
        assert_eq!(tracker.open_count(), 1);

        // Original start time survives the duplicate signal
        let closed = tracker.end("youtube.com", at(10, 10)).unwrap();
        assert_eq!(closed.elapsed_minutes, 10);
    }

    #[test]
    fn test_end_without_session_is_noop() {
        let mut tracker = SessionTracker::new();
        assert!(tracker.end("youtube.com", at(10, 0)).is_none());
    }

    #[test]
    fn test_end_floors_elapsed_minutes() {
        let mut tracker = SessionTracker::new();
        tracker.begin("youtube.com", at(10, 0));

        let now = NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(10, 7, 59)
            .unwrap();

        let closed = tracker.end("youtube.com", now).unwrap();
        assert_eq!(closed.elapsed_minutes, 7);
    }

    #[test]
    fn test_immediate_stop_commits_zero() {
        let mut tracker = SessionTracker::new();
        tracker.begin("youtube.com", at(10, 0));

        let closed = tracker.end("youtube.com", at(10, 0)).unwrap();
        assert_eq!(closed.elapsed_minutes, 0);
    }

    #[test]
    fn test_week_attributed_to_session_start() {
        let mut tracker = SessionTracker::new();

        // Saturday 23:50; stop lands on Sunday of the next week
        let start = NaiveDate::from_ymd_opt(2024, 5, 18)
            .unwrap()
            .and_hms_opt(23, 50, 0)
            .unwrap();
        let stop = NaiveDate::from_ymd_opt(2024, 5, 19)
            .unwrap()
            .and_hms_opt(0, 20, 0)
            .unwrap();

        tracker.begin("youtube.com", start);
        let closed = tracker.end("youtube.com", stop).unwrap();

        assert_eq!(closed.week, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
        assert_eq!(closed.elapsed_minutes, 30);
    }

    #[test]
    fn test_sites_tracked_independently() {
        let mut tracker = SessionTracker::new();

        tracker.begin("youtube.com", at(10, 0));
        tracker.begin("reddit.com", at(10, 5));
        assert_eq!(tracker.open_count(), 2);

        tracker.end("youtube.com", at(10, 30));
        assert!(!tracker.is_open("youtube.com"));
        assert!(tracker.is_open("reddit.com"));
    }

    #[test]
    fn test_open_sites_lists_open_sessions() {
        let mut tracker = SessionTracker::new();
        tracker.begin("youtube.com", at(10, 0));
        tracker.begin("reddit.com", at(10, 5));

        let mut sites = tracker.open_sites();
        sites.sort();
        assert_eq!(sites, vec!["reddit.com", "youtube.com"]);
    }
}

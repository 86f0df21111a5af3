//! Per-session, in-memory, non-persisted proxy state.
//!
//! The static (team-memory) block is memoized for a session's lifetime —
//! recomputing it, or ever overwriting it, would change the bytes sent
//! upstream and invalidate the provider's prompt cache (invariant f).
//! The dynamic-block tracking record and the last-observed message count
//! (used for request classification) live alongside it, guarded by the
//! same per-session lock.

use std::collections::HashMap;

use grov_contextpack::{DynamicBlockReport, StaticBlockReport, TrackingRecord};
use parking_lot::Mutex;

#[derive(Default)]
pub struct SessionCache {
    pub static_block: Option<String>,
    pub static_report: Option<StaticBlockReport>,
    pub tracking: TrackingRecord,
    pub last_message_count: usize,
    /// Most recent dynamic-block report, kept only for `GET /v1/context`
    /// introspection — never sent upstream.
    pub last_dynamic_report: Option<DynamicBlockReport>,
}

#[derive(Default)]
pub struct SessionCacheMap {
    sessions: Mutex<HashMap<String, SessionCache>>,
}

impl SessionCacheMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the session's cache entry, creating it on first use.
    pub fn with<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionCache) -> R) -> R {
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(session_id.to_owned()).or_default();
        f(entry)
    }

    /// Drop the cache entry for a session that has just been cleared or
    /// closed — its static block and tracking record are no longer valid.
    pub fn evict(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

/// §4.8 request classification: compares the incoming message count to
/// the last observed count for the session. Only `first` requests get
/// dynamic injection; static injection applies to every kind since it is
/// byte-identical and therefore cache-safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Retry,
    Continuation,
    First,
}

pub fn classify(last_message_count: usize, current_message_count: usize, last_message_is_tool_result: bool) -> RequestKind {
    if current_message_count == last_message_count {
        RequestKind::Retry
    } else if current_message_count > last_message_count && last_message_is_tool_result {
        RequestKind::Continuation
    } else {
        RequestKind::First
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_counts_is_retry() {
        assert_eq!(classify(5, 5, false), RequestKind::Retry);
    }

    #[test]
    fn increased_with_tool_result_is_continuation() {
        assert_eq!(classify(5, 6, true), RequestKind::Continuation);
    }

    #[test]
    fn increased_without_tool_result_is_first() {
        assert_eq!(classify(5, 6, false), RequestKind::First);
    }

    #[test]
    fn cache_map_creates_entry_on_first_use() {
        let map = SessionCacheMap::new();
        map.with("s1", |c| c.last_message_count = 3);
        let count = map.with("s1", |c| c.last_message_count);
        assert_eq!(count, 3);
    }
}

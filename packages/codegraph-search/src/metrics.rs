//! `ReloadMetrics`: thread-safe reload counters, exposing immutable snapshots.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Immutable copy of the reload counters at one instant. Produced by
/// `ReloadMetrics::snapshot`; never aliases the accumulator's internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub last_reload_time: Option<DateTime<Utc>>,
    pub last_reload_duration: Option<std::time::Duration>,
    pub last_reload_error: Option<String>,
    pub total_reloads: u64,
    pub successful_reloads: u64,
    pub failed_reloads: u64,
    pub current_chunk_count: usize,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            last_reload_time: None,
            last_reload_duration: None,
            last_reload_error: None,
            total_reloads: 0,
            successful_reloads: 0,
            failed_reloads: 0,
            current_chunk_count: 0,
        }
    }
}

struct MetricsState {
    snapshot: MetricsSnapshot,
}

/// Writers are rare (one per reload); readers are cheap and frequent, hence
/// the read/write lock rather than a mutex.
pub struct ReloadMetrics {
    state: RwLock<MetricsState>,
}

impl Default for ReloadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadMetrics {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MetricsState {
                snapshot: MetricsSnapshot::default(),
            }),
        }
    }

    /// Records the outcome of one reload. `error` present means failure:
    /// `current_chunk_count` is left at its previous value, since a failed
    /// reload does not change what's currently served.
    pub fn record(
        &self,
        duration: std::time::Duration,
        error: Option<String>,
        chunk_count: usize,
    ) {
        let mut state = self.state.write();
        let s = &mut state.snapshot;
        s.last_reload_time = Some(Utc::now());
        s.last_reload_duration = Some(duration);
        s.total_reloads += 1;

        match error {
            Some(message) => {
                s.last_reload_error = Some(message);
                s.failed_reloads += 1;
            }
            None => {
                s.last_reload_error = None;
                s.successful_reloads += 1;
                s.current_chunk_count = chunk_count;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.read().snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_snapshot_is_zeroed() {
        let metrics = ReloadMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.total_reloads, 0);
        assert_eq!(snap.successful_reloads, 0);
        assert_eq!(snap.failed_reloads, 0);
        assert!(snap.last_reload_time.is_none());
    }

    #[test]
    fn test_record_success_updates_chunk_count() {
        let metrics = ReloadMetrics::new();
        metrics.record(Duration::from_millis(10), None, 42);
        let snap = metrics.snapshot();
        assert_eq!(snap.total_reloads, 1);
        assert_eq!(snap.successful_reloads, 1);
        assert_eq!(snap.failed_reloads, 0);
        assert_eq!(snap.current_chunk_count, 42);
        assert!(snap.last_reload_error.is_none());
    }

    #[test]
    fn test_record_failure_preserves_previous_chunk_count() {
        let metrics = ReloadMetrics::new();
        metrics.record(Duration::from_millis(10), None, 10);
        metrics.record(Duration::from_millis(5), Some("boom".to_string()), 999);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_reloads, 2);
        assert_eq!(snap.successful_reloads, 1);
        assert_eq!(snap.failed_reloads, 1);
        assert_eq!(snap.current_chunk_count, 10, "failure must not overwrite chunk count");
        assert_eq!(snap.last_reload_error, Some("boom".to_string()));
    }

    #[test]
    fn test_total_equals_success_plus_failed_invariant() {
        let metrics = ReloadMetrics::new();
        metrics.record(Duration::from_millis(1), None, 1);
        metrics.record(Duration::from_millis(1), Some("e".to_string()), 0);
        metrics.record(Duration::from_millis(1), None, 2);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_reloads, snap.successful_reloads + snap.failed_reloads);
    }
}

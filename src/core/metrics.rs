//! Logger metrics for observability
//!
//! Write failures never reach the caller of an emit operation; these counters are the
//! only place they show up.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-logger write counters
///
/// # Example
///
/// ```
/// use rust_trace_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_written();
/// metrics.record_failed();
///
/// assert_eq!(metrics.written_count(), 1);
/// assert_eq!(metrics.failed_count(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records accepted and written by a sink, counted once per sink
    written: AtomicU64,

    /// Sink writes that returned an error or panicked
    failed: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn written_count(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Record a successful sink write, returning the previous count
    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a failed sink write, returning the previous count
    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    /// Failure rate as a percentage (0.0 - 100.0); 0.0 before any write.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed_count() as f64;
        let total = self.written_count() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.written.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            written: AtomicU64::new(self.written_count()),
            failed: AtomicU64::new(self.failed_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.written_count(), 0);
        assert_eq!(metrics.failed_count(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_failed(), 0);
        assert_eq!(metrics.record_failed(), 1);
        assert_eq!(metrics.failed_count(), 2);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_written();
        }
        for _ in 0..10 {
            metrics.record_failed();
        }
        let rate = metrics.failure_rate();
        assert!((rate - 10.0).abs() < 1e-9, "Failure rate was {}", rate);
    }

    #[test]
    fn test_clone_is_snapshot() {
        let metrics = LoggerMetrics::new();
        metrics.record_written();
        let snapshot = metrics.clone();
        metrics.record_written();
        assert_eq!(snapshot.written_count(), 1);
        assert_eq!(metrics.written_count(), 2);

        metrics.reset();
        assert_eq!(metrics.written_count(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(LoggerMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_written();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.written_count(), 4000);
    }
}

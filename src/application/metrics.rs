//! Observability metrics for task submission.
//!
//! Provides metrics about submission outcomes for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking submission statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Metrics are collected at the submission boundary and can be queried at
/// any time for observability.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total number of tasks that completed successfully
    tasks_succeeded: AtomicU64,
    /// Total number of tasks rejected by a saturated gate or pool
    tasks_rejected_saturated: AtomicU64,
    /// Total number of tasks rejected by an open circuit breaker
    tasks_rejected_open: AtomicU64,
    /// Total number of tasks that ran past their deadline
    tasks_timed_out: AtomicU64,
    /// Total number of tasks that failed (task error or panic)
    tasks_failed: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                tasks_succeeded: AtomicU64::new(0),
                tasks_rejected_saturated: AtomicU64::new(0),
                tasks_rejected_open: AtomicU64::new(0),
                tasks_timed_out: AtomicU64::new(0),
                tasks_failed: AtomicU64::new(0),
            }),
        }
    }

    /// Record a successful completion.
    pub(crate) fn record_success(&self) {
        self.inner.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a saturation rejection (gate or pool full).
    pub(crate) fn record_saturated(&self) {
        self.inner
            .tasks_rejected_saturated
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record an open-circuit rejection.
    pub(crate) fn record_circuit_open(&self) {
        self.inner.tasks_rejected_open.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deadline overrun.
    pub(crate) fn record_timeout(&self) {
        self.inner.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task failure (error return or panic).
    pub(crate) fn record_failure(&self) {
        self.inner.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of tasks that completed successfully.
    pub fn tasks_succeeded(&self) -> u64 {
        self.inner.tasks_succeeded.load(Ordering::Relaxed)
    }

    /// Get the total number of tasks rejected by a saturated gate or pool.
    pub fn tasks_rejected_saturated(&self) -> u64 {
        self.inner.tasks_rejected_saturated.load(Ordering::Relaxed)
    }

    /// Get the total number of tasks rejected by an open circuit breaker.
    pub fn tasks_rejected_open(&self) -> u64 {
        self.inner.tasks_rejected_open.load(Ordering::Relaxed)
    }

    /// Get the total number of tasks that ran past their deadline.
    pub fn tasks_timed_out(&self) -> u64 {
        self.inner.tasks_timed_out.load(Ordering::Relaxed)
    }

    /// Get the total number of tasks that failed.
    pub fn tasks_failed(&self) -> u64 {
        self.inner.tasks_failed.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_succeeded: self.tasks_succeeded(),
            tasks_rejected_saturated: self.tasks_rejected_saturated(),
            tasks_rejected_open: self.tasks_rejected_open(),
            tasks_timed_out: self.tasks_timed_out(),
            tasks_failed: self.tasks_failed(),
        }
    }

    /// Reset all metrics to zero.
    ///
    /// Useful for testing or when starting a new monitoring period.
    pub fn reset(&self) {
        self.inner.tasks_succeeded.store(0, Ordering::Relaxed);
        self.inner.tasks_rejected_saturated.store(0, Ordering::Relaxed);
        self.inner.tasks_rejected_open.store(0, Ordering::Relaxed);
        self.inner.tasks_timed_out.store(0, Ordering::Relaxed);
        self.inner.tasks_failed.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total number of tasks that completed successfully
    pub tasks_succeeded: u64,
    /// Total number of tasks rejected by a saturated gate or pool
    pub tasks_rejected_saturated: u64,
    /// Total number of tasks rejected by an open circuit breaker
    pub tasks_rejected_open: u64,
    /// Total number of tasks that ran past their deadline
    pub tasks_timed_out: u64,
    /// Total number of tasks that failed
    pub tasks_failed: u64,
}

impl MetricsSnapshot {
    /// Get the total number of submissions observed.
    pub fn total_submissions(&self) -> u64 {
        self.tasks_succeeded
            .saturating_add(self.tasks_rejected_saturated)
            .saturating_add(self.tasks_rejected_open)
            .saturating_add(self.tasks_timed_out)
            .saturating_add(self.tasks_failed)
    }

    /// Calculate the rejection rate (0.0 to 1.0).
    ///
    /// Returns the ratio of policy rejections (saturation, open circuit,
    /// timeout) to total submissions. Returns 0.0 if nothing was submitted.
    pub fn rejection_rate(&self) -> f64 {
        let rejected = self
            .tasks_rejected_saturated
            .saturating_add(self.tasks_rejected_open)
            .saturating_add(self.tasks_timed_out);
        let total = self.total_submissions();
        if total == 0 {
            0.0
        } else {
            rejected as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(metrics.tasks_succeeded(), 0);
        assert_eq!(metrics.tasks_rejected_saturated(), 0);
        assert_eq!(metrics.tasks_rejected_open(), 0);
        assert_eq!(metrics.tasks_timed_out(), 0);
        assert_eq!(metrics.tasks_failed(), 0);
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = Metrics::new();
        metrics.record_success();
        metrics.record_success();
        metrics.record_saturated();
        metrics.record_circuit_open();
        metrics.record_timeout();
        metrics.record_failure();

        assert_eq!(metrics.tasks_succeeded(), 2);
        assert_eq!(metrics.tasks_rejected_saturated(), 1);
        assert_eq!(metrics.tasks_rejected_open(), 1);
        assert_eq!(metrics.tasks_timed_out(), 1);
        assert_eq!(metrics.tasks_failed(), 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();
        metrics.record_success();
        metrics.record_saturated();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.tasks_rejected_saturated, 1);
        assert_eq!(snapshot.total_submissions(), 2);
    }

    #[test]
    fn test_snapshot_rejection_rate() {
        let metrics = Metrics::new();

        // No submissions - rate should be 0
        assert_eq!(metrics.snapshot().rejection_rate(), 0.0);

        // 1 success, 0 rejections - rate should be 0
        metrics.record_success();
        assert_eq!(metrics.snapshot().rejection_rate(), 0.0);

        // 1 success, 1 rejection - rate should be 0.5
        metrics.record_saturated();
        assert!((metrics.snapshot().rejection_rate() - 0.5).abs() < f64::EPSILON);

        // Failures count toward the total but not the rejection numerator
        metrics.record_failure();
        metrics.record_failure();
        assert!((metrics.snapshot().rejection_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_success();
        metrics.record_timeout();

        metrics.reset();
        assert_eq!(metrics.snapshot().total_submissions(), 0);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics1 = Metrics::new();
        metrics1.record_success();

        let metrics2 = metrics1.clone();
        metrics2.record_success();

        // Both should see the same value (shared Arc)
        assert_eq!(metrics1.tasks_succeeded(), 2);
        assert_eq!(metrics2.tasks_succeeded(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        // Spawn 10 threads, each recording 100 outcomes
        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_success();
                    m.record_saturated();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.tasks_succeeded(), 1000);
        assert_eq!(metrics.tasks_rejected_saturated(), 1000);
    }
}

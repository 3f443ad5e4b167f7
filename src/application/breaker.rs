//! Sliding-window circuit breaker.
//!
//! Tracks per-call outcomes in a count- or time-based window and trips open
//! when the failure rate or slow-call rate crosses its threshold, once a
//! minimum number of calls has been observed. An open breaker rejects calls
//! until its wait elapses, then admits a limited number of half-open trials
//! whose aggregate outcome decides between closing and reopening.
//!
//! All timing runs through the [`Clock`] port, so every transition can be
//! tested deterministically.

use crate::application::ports::Clock;
use crate::domain::config::{BreakerParams, SlidingWindow};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally
    Closed,
    /// Circuit is open, calls are rejected
    Open,
    /// Circuit is testing recovery with a limited number of trial calls
    HalfOpen,
}

/// Rejection returned when the breaker does not permit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRejected;

#[derive(Debug, Clone, Copy)]
struct CallOutcome {
    failed: bool,
    slow: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct OutcomeCounts {
    total: u32,
    failed: u32,
    slow: u32,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: CallOutcome) {
        self.total += 1;
        if outcome.failed {
            self.failed += 1;
        }
        if outcome.slow {
            self.slow += 1;
        }
    }
}

#[derive(Debug)]
enum StateInner {
    Closed,
    Open { since: Instant },
    HalfOpen {
        since: Instant,
        trials_started: u32,
        trials: OutcomeCounts,
    },
}

#[derive(Debug)]
enum Window {
    Count { entries: VecDeque<CallOutcome>, capacity: usize },
    Time { entries: VecDeque<(Instant, CallOutcome)>, span: Duration },
}

impl Window {
    fn new(window: SlidingWindow) -> Self {
        match window {
            SlidingWindow::Count(capacity) => Window::Count {
                entries: VecDeque::with_capacity(capacity as usize),
                capacity: capacity as usize,
            },
            SlidingWindow::Time(span) => Window::Time {
                entries: VecDeque::new(),
                span,
            },
        }
    }

    fn record(&mut self, now: Instant, outcome: CallOutcome) {
        match self {
            Window::Count { entries, capacity } => {
                if entries.len() == *capacity {
                    entries.pop_front();
                }
                entries.push_back(outcome);
            }
            Window::Time { entries, span } => {
                Self::expire(entries, now, *span);
                entries.push_back((now, outcome));
            }
        }
    }

    fn counts(&mut self, now: Instant) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        match self {
            Window::Count { entries, .. } => {
                for outcome in entries.iter() {
                    counts.add(*outcome);
                }
            }
            Window::Time { entries, span } => {
                Self::expire(entries, now, *span);
                for (_, outcome) in entries.iter() {
                    counts.add(*outcome);
                }
            }
        }
        counts
    }

    fn clear(&mut self) {
        match self {
            Window::Count { entries, .. } => entries.clear(),
            Window::Time { entries, .. } => entries.clear(),
        }
    }

    fn expire(entries: &mut VecDeque<(Instant, CallOutcome)>, now: Instant, span: Duration) {
        while let Some((at, _)) = entries.front() {
            if now.duration_since(*at) >= span {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: StateInner,
    window: Window,
}

/// Sliding-window circuit breaker driven by an injected clock.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    params: BreakerParams,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker with an empty window.
    pub fn new(name: impl Into<String>, params: BreakerParams, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            params,
            clock,
            inner: Mutex::new(BreakerInner {
                state: StateInner::Closed,
                window: Window::new(params.window),
            }),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, BreakerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Get the current circuit state.
    ///
    /// With `auto_open_to_half_open` set, an open breaker whose wait has
    /// elapsed reports (and becomes) half-open on any state read. Without
    /// it, the transition only happens when a call is attempted.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now();
        let mut guard = self.lock_inner();
        if self.params.auto_open_to_half_open {
            let opened = match &guard.state {
                StateInner::Open { since } => Some(*since),
                _ => None,
            };
            if let Some(since) = opened {
                if now.duration_since(since) >= self.params.wait_duration_open {
                    guard.state = StateInner::HalfOpen {
                        since: now,
                        trials_started: 0,
                        trials: OutcomeCounts::default(),
                    };
                    tracing::info!(
                        breaker = %self.name,
                        "circuit breaker half-open, admitting trial calls"
                    );
                }
            }
        }
        match guard.state {
            StateInner::Closed => CircuitState::Closed,
            StateInner::Open { .. } => CircuitState::Open,
            StateInner::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Ask the breaker to admit a call.
    ///
    /// An open breaker whose wait has elapsed flips to half-open and admits
    /// the caller as the first trial. A half-open breaker admits up to the
    /// permitted number of trials; past its maximum half-open residence it
    /// flips back to open and rejects.
    pub fn try_acquire(&self) -> Result<(), CallRejected> {
        let now = self.clock.now();
        let mut guard = self.lock_inner();
        let inner = &mut *guard;
        match &mut inner.state {
            StateInner::Closed => Ok(()),
            StateInner::Open { since } => {
                if now.duration_since(*since) >= self.params.wait_duration_open {
                    inner.state = StateInner::HalfOpen {
                        since: now,
                        trials_started: 1,
                        trials: OutcomeCounts::default(),
                    };
                    tracing::info!(
                        breaker = %self.name,
                        "circuit breaker half-open, admitting trial calls"
                    );
                    Ok(())
                } else {
                    Err(CallRejected)
                }
            }
            StateInner::HalfOpen {
                since,
                trials_started,
                ..
            } => {
                let max_wait = self.params.max_wait_in_half_open;
                if !max_wait.is_zero() && now.duration_since(*since) >= max_wait {
                    inner.state = StateInner::Open { since: now };
                    tracing::warn!(
                        breaker = %self.name,
                        "circuit breaker reopened: half-open residence expired"
                    );
                    return Err(CallRejected);
                }
                if *trials_started < self.params.permitted_calls_in_half_open {
                    *trials_started += 1;
                    Ok(())
                } else {
                    Err(CallRejected)
                }
            }
        }
    }

    /// Record the outcome of an admitted call.
    ///
    /// `success` is false for task errors, timeouts, and panics alike. A
    /// call is additionally slow when it ran longer than the slow-call
    /// duration threshold, regardless of its outcome.
    pub fn record(&self, elapsed: Duration, success: bool) {
        let now = self.clock.now();
        let outcome = CallOutcome {
            failed: !success,
            slow: elapsed > self.params.slow_call_duration_threshold,
        };
        let mut guard = self.lock_inner();
        let inner = &mut *guard;
        match &mut inner.state {
            StateInner::Closed => {
                inner.window.record(now, outcome);
                let counts = inner.window.counts(now);
                if counts.total >= self.params.minimum_calls && self.over_threshold(counts) {
                    inner.state = StateInner::Open { since: now };
                    inner.window.clear();
                    tracing::warn!(
                        breaker = %self.name,
                        failed = counts.failed,
                        slow = counts.slow,
                        total = counts.total,
                        "circuit breaker opened"
                    );
                }
            }
            StateInner::HalfOpen { trials, .. } => {
                trials.add(outcome);
                if trials.total >= self.params.permitted_calls_in_half_open {
                    let verdict = *trials;
                    if self.over_threshold(verdict) {
                        inner.state = StateInner::Open { since: now };
                        tracing::warn!(
                            breaker = %self.name,
                            failed = verdict.failed,
                            total = verdict.total,
                            "circuit breaker reopened: trial calls failed"
                        );
                    } else {
                        inner.state = StateInner::Closed;
                        tracing::info!(breaker = %self.name, "circuit breaker closed");
                    }
                    inner.window.clear();
                }
            }
            // A completion from before the last transition; nothing to count.
            StateInner::Open { .. } => {}
        }
    }

    // Integer rate check: failed/total >= threshold/100, without division.
    // Thresholds are at least 1, so a zero count can never trip.
    fn over_threshold(&self, counts: OutcomeCounts) -> bool {
        let failure_threshold = u32::from(self.params.failure_rate_threshold);
        let slow_threshold = u32::from(self.params.slow_call_rate_threshold);
        counts.failed * 100 >= failure_threshold * counts.total
            || counts.slow * 100 >= slow_threshold * counts.total
    }
}

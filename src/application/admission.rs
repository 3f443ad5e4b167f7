//! Admission gate limiting parallel entries into a scope.
//!
//! The gate holds a fixed number of slots. A submission acquires a slot
//! before any other stage runs and releases it when the submission finishes,
//! whatever the outcome. When all slots are taken, acquisition either fails
//! immediately (zero wait) or blocks for a bounded time waiting for a
//! release.

use crate::domain::config::AdmissionParams;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// Rejection returned when no slot became available within the wait budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSaturated;

/// Concurrency gate with a bounded wait.
#[derive(Debug)]
pub struct AdmissionGate {
    params: AdmissionParams,
    available: Mutex<u32>,
    released: Condvar,
}

impl AdmissionGate {
    /// Create a gate with all slots free.
    pub fn new(params: AdmissionParams) -> Self {
        Self {
            params,
            available: Mutex::new(params.max_concurrent),
            released: Condvar::new(),
        }
    }

    /// Acquire a slot, blocking for at most the configured wait.
    ///
    /// The returned permit releases the slot on drop. Release wakes exactly
    /// one blocked waiter.
    pub fn acquire(&self) -> Result<AdmissionPermit<'_>, GateSaturated> {
        let mut available = match self.available.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *available == 0 {
            if self.params.max_wait.is_zero() {
                return Err(GateSaturated);
            }
            let deadline = Instant::now() + self.params.max_wait;
            while *available == 0 {
                let now = Instant::now();
                if now >= deadline {
                    return Err(GateSaturated);
                }
                let (guard, _timed_out) = match self.released.wait_timeout(available, deadline - now)
                {
                    Ok(result) => result,
                    Err(poisoned) => poisoned.into_inner(),
                };
                available = guard;
            }
        }
        *available -= 1;
        Ok(AdmissionPermit { gate: self })
    }

    /// Number of free slots right now. Intended for assertions and
    /// observability, not for try-then-acquire logic.
    pub fn available(&self) -> u32 {
        match self.available.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// RAII slot handle; releases the slot when dropped.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        let mut available = match self.gate.available.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *available += 1;
        self.gate.released.notify_one();
    }
}

//! Submission entry point composing the policy stack.
//!
//! `submit` resolves the scope, then threads the task through the enabled
//! policies in a fixed order: admission gate, isolated pool, circuit
//! breaker, deadline, task body. Disabled policies drop out of the chain
//! without changing the order of the rest.
//!
//! Every internal stage failure is translated into a caller-visible
//! [`SubmitError`] exactly once, here at the boundary. The first stage to
//! reject wins; stages further down never run. Task panics are contained
//! and surface as internal errors, counted as failures by the breaker like
//! any other non-success.

use crate::application::deadline::{self, RaceError};
use crate::application::metrics::Metrics;
use crate::application::ports::Clock;
use crate::application::registry::{CallConfig, ScopeRegistry, ScopeRuntime};
use crate::domain::config::ExecutorConfig;
use crate::domain::failure::{ConfigError, SubmitError, TaskError};
use crate::infrastructure::clock::SystemClock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Outcome of the protected stages, before boundary classification.
#[derive(Debug)]
enum StageFailure {
    CircuitOpen,
    Timeout(Duration),
    Task(TaskError),
    Panicked(String),
}

/// Scoped task executor.
///
/// Cheap to clone; clones share the registry, policy state, and metrics.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<ScopeRegistry>,
    metrics: Metrics,
    clock: Arc<dyn Clock>,
}

impl Executor {
    /// Build an executor from a startup configuration, on the system clock.
    pub fn new(config: &ExecutorConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Build an executor on an explicit clock.
    ///
    /// Intended for tests driving breaker transitions deterministically
    /// through a mock clock.
    pub fn with_clock(
        config: &ExecutorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let registry = ScopeRegistry::new(config, Arc::clone(&clock))?;
        Ok(Self {
            registry: Arc::new(registry),
            metrics: Metrics::new(),
            clock,
        })
    }

    /// Run a task under the policies of the scope the name resolves to.
    ///
    /// Blocks until the task completes, is rejected, or times out. The
    /// resolved [`CallConfig`] is passed to the task body so it can honor
    /// its own deadline cooperatively.
    pub fn submit<F>(&self, scope: &str, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce(&CallConfig) -> Result<(), TaskError> + Send + 'static,
    {
        let runtime = self.registry.resolve(scope);
        let call_config = self.registry.call_config(scope);

        // Admission is the outermost stage; the permit spans everything
        // below, including the wait for a pooled result.
        let _permit = match runtime.gate() {
            Some(gate) => match gate.acquire() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return Err(self.reject_saturated(scope, "admission gate full"));
                }
            },
            None => None,
        };

        let result = if runtime.pool().is_some() {
            let (tx, rx) = mpsc::channel();
            let worker_runtime = Arc::clone(&runtime);
            let worker_clock = Arc::clone(&self.clock);
            let dispatched = runtime.pool().map(|pool| {
                pool.dispatch(Box::new(move || {
                    let _ = tx.send(run_protected(
                        &worker_runtime,
                        &worker_clock,
                        &call_config,
                        task,
                    ));
                }))
            });
            match dispatched {
                Some(Ok(())) => match rx.recv() {
                    Ok(result) => result,
                    Err(_) => Err(StageFailure::Panicked(
                        "pool worker dropped the task result".to_string(),
                    )),
                },
                Some(Err(_)) | None => {
                    return Err(self.reject_saturated(scope, "pool queue full"));
                }
            }
        } else {
            run_protected(&runtime, &self.clock, &call_config, task)
        };

        self.classify(scope, result)
    }

    /// Metrics accumulated across all scopes.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The scope registry backing this executor.
    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    fn reject_saturated(&self, scope: &str, stage: &'static str) -> SubmitError {
        self.metrics.record_saturated();
        tracing::warn!(scope, stage, "task rejected: concurrency limit exceeded");
        SubmitError::LimitExceeded {
            scope: scope.to_string(),
        }
    }

    fn classify(&self, scope: &str, result: Result<(), StageFailure>) -> Result<(), SubmitError> {
        match result {
            Ok(()) => {
                self.metrics.record_success();
                Ok(())
            }
            Err(StageFailure::CircuitOpen) => {
                self.metrics.record_circuit_open();
                tracing::warn!(scope, "task rejected: circuit breaker open");
                Err(SubmitError::CircuitOpen {
                    scope: scope.to_string(),
                })
            }
            Err(StageFailure::Timeout(deadline)) => {
                self.metrics.record_timeout();
                tracing::warn!(scope, ?deadline, "task abandoned: deadline exceeded");
                Err(SubmitError::Timeout {
                    scope: scope.to_string(),
                    deadline,
                })
            }
            Err(StageFailure::Task(TaskError::Domain(e))) => {
                self.metrics.record_failure();
                Err(SubmitError::Domain(e))
            }
            Err(StageFailure::Task(TaskError::Other(e))) => {
                self.metrics.record_failure();
                Err(SubmitError::Internal(e))
            }
            Err(StageFailure::Panicked(message)) => {
                self.metrics.record_failure();
                tracing::error!(scope, message = %message, "task panicked");
                Err(SubmitError::Internal(message.into()))
            }
        }
    }
}

/// Breaker, deadline, and task body: the stages that run on the executing
/// thread (the pool worker when the pool is enabled, the submitting thread
/// otherwise).
fn run_protected<F>(
    runtime: &ScopeRuntime,
    clock: &Arc<dyn Clock>,
    call_config: &Arc<CallConfig>,
    task: F,
) -> Result<(), StageFailure>
where
    F: FnOnce(&CallConfig) -> Result<(), TaskError> + Send + 'static,
{
    match runtime.breaker() {
        Some(breaker) => {
            breaker
                .try_acquire()
                .map_err(|_| StageFailure::CircuitOpen)?;
            let started = clock.now();
            let result = run_with_deadline(runtime, call_config, task);
            let elapsed = clock.now().duration_since(started);
            breaker.record(elapsed, result.is_ok());
            result
        }
        None => run_with_deadline(runtime, call_config, task),
    }
}

fn run_with_deadline<F>(
    runtime: &ScopeRuntime,
    call_config: &Arc<CallConfig>,
    task: F,
) -> Result<(), StageFailure>
where
    F: FnOnce(&CallConfig) -> Result<(), TaskError> + Send + 'static,
{
    let config = Arc::clone(call_config);
    let body = move || {
        panic::catch_unwind(AssertUnwindSafe(move || task(&config))).map_err(panic_message)
    };
    match runtime.deadline() {
        Some(params) => match deadline::race(params.timeout, body) {
            Ok(outcome) => flatten(outcome),
            Err(RaceError::DeadlineExceeded) => Err(StageFailure::Timeout(params.timeout)),
            Err(RaceError::BodyVanished) => Err(StageFailure::Panicked(
                "task thread exited without a result".to_string(),
            )),
        },
        None => flatten(body()),
    }
}

fn flatten(outcome: Result<Result<(), TaskError>, String>) -> Result<(), StageFailure> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(task_error)) => Err(StageFailure::Task(task_error)),
        Err(message) => Err(StageFailure::Panicked(message)),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{
        AdmissionConfig, CircuitBreakerConfig, DeadlineConfig, ScopeOverride, ScopePolicyConfig,
    };
    use std::fmt;
    use std::thread;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn scoped(scope: &str, config: ScopePolicyConfig) -> ExecutorConfig {
        ExecutorConfig {
            defaults: ScopePolicyConfig::default(),
            scopes: vec![ScopeOverride {
                scope: scope.to_string(),
                config,
            }],
        }
    }

    #[test]
    fn test_no_policies_runs_inline() {
        let executor = Executor::new(&ExecutorConfig::default()).unwrap();
        let caller = thread::current().id();

        let mut ran_on = None;
        let (tx, rx) = mpsc::channel();
        executor
            .submit("anything", move |config| {
                let _ = tx.send((thread::current().id(), config.scope.clone()));
                Ok(())
            })
            .unwrap();
        if let Ok((thread_id, scope)) = rx.try_recv() {
            ran_on = Some(thread_id);
            assert_eq!(scope, "DEFAULT");
        }
        assert_eq!(ran_on, Some(caller));
        assert_eq!(executor.metrics().tasks_succeeded(), 1);
    }

    #[test]
    fn test_domain_error_passes_through() {
        let executor = Executor::new(&ExecutorConfig::default()).unwrap();
        let err = executor
            .submit("s", |_| Err(TaskError::domain(Boom)))
            .unwrap_err();
        assert!(matches!(err, SubmitError::Domain(_)));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(executor.metrics().tasks_failed(), 1);
    }

    #[test]
    fn test_other_error_is_internal() {
        let executor = Executor::new(&ExecutorConfig::default()).unwrap();
        let err = executor
            .submit("s", |_| Err(TaskError::other(Boom)))
            .unwrap_err();
        assert!(matches!(err, SubmitError::Internal(_)));
    }

    #[test]
    fn test_panic_is_contained() {
        let executor = Executor::new(&ExecutorConfig::default()).unwrap();
        let err = executor
            .submit("s", |_| -> Result<(), TaskError> { panic!("kaboom") })
            .unwrap_err();
        match err {
            SubmitError::Internal(e) => assert!(e.to_string().contains("kaboom")),
            other => panic!("expected Internal, got {:?}", other),
        }

        // The executor is still usable afterwards.
        executor.submit("s", |_| Ok(())).unwrap();
    }

    #[test]
    fn test_gate_saturation_classified() {
        let config = scoped(
            "busy",
            ScopePolicyConfig {
                admission: AdmissionConfig {
                    enabled: Some(true),
                    max_concurrent: Some(1),
                    max_wait: Some(Duration::ZERO),
                },
                ..ScopePolicyConfig::default()
            },
        );
        let executor = Executor::new(&config).unwrap();
        let (hold_tx, hold_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        let background = {
            let executor = executor.clone();
            thread::spawn(move || {
                executor.submit("busy", move |_| {
                    let _ = started_tx.send(());
                    let _ = hold_rx.recv();
                    Ok(())
                })
            })
        };
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let err = executor.submit("busy", |_| Ok(())).unwrap_err();
        assert!(matches!(err, SubmitError::LimitExceeded { .. }));
        assert!(err.is_retryable());

        hold_tx.send(()).unwrap();
        background.join().unwrap().unwrap();

        // The slot was released; the scope admits again.
        executor.submit("busy", |_| Ok(())).unwrap();
        assert_eq!(executor.metrics().tasks_rejected_saturated(), 1);
        assert_eq!(executor.metrics().tasks_succeeded(), 2);
    }

    #[test]
    fn test_timeout_classified_and_slot_released() {
        let config = scoped(
            "slow",
            ScopePolicyConfig {
                admission: AdmissionConfig {
                    enabled: Some(true),
                    max_concurrent: Some(1),
                    max_wait: Some(Duration::ZERO),
                },
                deadline: DeadlineConfig {
                    enabled: Some(true),
                    timeout: Some(Duration::from_millis(30)),
                },
                ..ScopePolicyConfig::default()
            },
        );
        let executor = Executor::new(&config).unwrap();

        let err = executor
            .submit("slow", |_| {
                thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .unwrap_err();
        match err {
            SubmitError::Timeout { scope, deadline } => {
                assert_eq!(scope, "slow");
                assert_eq!(deadline, Duration::from_millis(30));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }

        // The admission slot came back with the timeout.
        executor.submit("slow", |_| Ok(())).unwrap();
        assert_eq!(executor.metrics().tasks_timed_out(), 1);
    }

    #[test]
    fn test_circuit_open_classified() {
        let config = scoped(
            "flaky",
            ScopePolicyConfig {
                circuit_breaker: CircuitBreakerConfig {
                    enabled: Some(true),
                    minimum_calls: Some(2),
                    sliding_window_task_count: Some(2),
                    ..CircuitBreakerConfig::with_defaults()
                },
                ..ScopePolicyConfig::default()
            },
        );
        let executor = Executor::new(&config).unwrap();

        for _ in 0..2 {
            let _ = executor.submit("flaky", |_| Err(TaskError::other(Boom)));
        }

        let err = executor.submit("flaky", |_| Ok(())).unwrap_err();
        assert!(matches!(err, SubmitError::CircuitOpen { .. }));
        assert!(err.is_retryable());
        assert_eq!(executor.metrics().tasks_rejected_open(), 1);
    }

    #[test]
    fn test_task_receives_memoized_call_config() {
        let config = scoped(
            "payments",
            ScopePolicyConfig {
                deadline: DeadlineConfig {
                    enabled: Some(true),
                    timeout: Some(Duration::from_secs(5)),
                },
                ..ScopePolicyConfig::default()
            },
        );
        let executor = Executor::new(&config).unwrap();

        let (tx, rx) = mpsc::channel();
        executor
            .submit("payments.refund", move |config| {
                let _ = tx.send(config.clone());
                Ok(())
            })
            .unwrap();
        let seen = rx.recv().unwrap();
        assert_eq!(seen.scope, "payments");
        assert_eq!(seen.deadline, Some(Duration::from_secs(5)));
    }
}

//! # scoped-executor
//!
//! Scoped, fault-tolerant task execution. Tasks are submitted under a
//! dot-delimited scope name (`payments.refund.retry`); the scope selects a
//! configuration profile, and the profile decides which resilience policies
//! wrap the task:
//!
//! - **Admission gate**: bounds how many tasks run under a scope at once,
//!   with an optional bounded wait for a slot
//! - **Isolated pool**: runs tasks on a dedicated bounded worker pool so one
//!   scope's slowness cannot occupy another's threads
//! - **Circuit breaker**: trips on failure or slow-call rates over a sliding
//!   window and recovers through half-open trials
//! - **Deadline**: abandons tasks that run past their time budget
//!
//! Policies are disabled until explicitly enabled, and each can be enabled
//! independently per scope.
//!
//! ## Quick Start
//!
//! ```rust
//! use scoped_executor::{
//!     AdmissionConfig, DeadlineConfig, Executor, ExecutorConfig, ScopeOverride,
//!     ScopePolicyConfig,
//! };
//! use std::time::Duration;
//!
//! let config = ExecutorConfig {
//!     defaults: ScopePolicyConfig::default(),
//!     scopes: vec![ScopeOverride {
//!         scope: "payments".to_string(),
//!         config: ScopePolicyConfig {
//!             admission: AdmissionConfig {
//!                 enabled: Some(true),
//!                 max_concurrent: Some(8),
//!                 max_wait: Some(Duration::from_millis(50)),
//!             },
//!             deadline: DeadlineConfig {
//!                 enabled: Some(true),
//!                 timeout: Some(Duration::from_secs(2)),
//!             },
//!             ..ScopePolicyConfig::default()
//!         },
//!     }],
//! };
//!
//! let executor = Executor::new(&config).expect("valid configuration");
//!
//! // "payments.refund" resolves to the "payments" profile by containment.
//! let result = executor.submit("payments.refund", |call| {
//!     // `call` carries the resolved scope and deadline.
//!     assert_eq!(call.scope, "payments");
//!     Ok(())
//! });
//! assert!(result.is_ok());
//! ```
//!
//! ## Scope Resolution
//!
//! Configuration is hierarchical. Hard-coded baselines are overridden by the
//! `defaults` block, which is overridden per scope, field by field: an unset
//! field always inherits, a set field always wins.
//!
//! A submitted scope name resolves to a profile in three steps, scanning
//! registered names from longest to shortest:
//!
//! 1. exact match, ignoring case;
//! 2. the first registered name contained in the query (case-sensitive);
//! 3. the `DEFAULT` profile.
//!
//! Resolution is memoized per query string, so steady-state submission does
//! not rescan the registry.
//!
//! ## Failure Classification
//!
//! [`Executor::submit`] reports every outcome through [`SubmitError`]:
//! saturation as [`SubmitError::LimitExceeded`], an open breaker as
//! [`SubmitError::CircuitOpen`], a deadline overrun as
//! [`SubmitError::Timeout`], and task failures as either
//! [`SubmitError::Domain`] (the caller's own error, passed through
//! unchanged) or [`SubmitError::Internal`] (anything else, including
//! contained panics). [`SubmitError::is_retryable`] distinguishes transient
//! rejections from real failures.
//!
//! Note that a timed-out task is abandoned, not cancelled: the body keeps
//! running on its thread and its result is discarded. Bodies with external
//! effects should honor the deadline they receive via
//! [`CallConfig`](application::registry::CallConfig).
//!
//! ## Observability
//!
//! Submission outcomes are counted per executor:
//!
//! ```rust
//! # use scoped_executor::{Executor, ExecutorConfig};
//! # let executor = Executor::new(&ExecutorConfig::default()).unwrap();
//! # let _ = executor.submit("s", |_| Ok(()));
//! let snapshot = executor.metrics().snapshot();
//! println!("succeeded: {}", snapshot.tasks_succeeded);
//! println!("rejection rate: {:.2}%", snapshot.rejection_rate() * 100.0);
//! ```
//!
//! Registration and rejections are also logged through `tracing`.
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` on the configuration types, for
//!   loading profiles from a config file
//! - `test-helpers`: exposes `MockClock` for deterministic breaker tests in
//!   downstream crates

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    config::{
        AdmissionConfig, AdmissionParams, BreakerParams, CircuitBreakerConfig, DeadlineConfig,
        DeadlineParams, ExecutorConfig, IsolatedPoolConfig, PoolParams, ResolvedPolicies,
        ScopeOverride, ScopePolicyConfig, SlidingWindow, SlidingWindowKind,
    },
    failure::{BoxError, ConfigError, SubmitError, TaskError},
    scope::{is_valid_scope, ScopeName, DEFAULT_SCOPE},
};

pub use application::{
    breaker::{CircuitBreaker, CircuitState},
    executor::Executor,
    metrics::{Metrics, MetricsSnapshot},
    ports::Clock,
    registry::{CallConfig, ScopeRegistry, ScopeRuntime},
};

pub use infrastructure::clock::SystemClock;

#[cfg(any(test, feature = "test-helpers"))]
pub use infrastructure::mocks::MockClock;

//! Failure taxonomy for task submission.
//!
//! Policy internals (gate, pool, breaker, deadline) report their own error
//! kinds; those are translated into the caller-visible [`SubmitError`]
//! exactly once at the executor boundary, so internal types never leak.
//! Errors from the caller's own domain travel through the stack unchanged.

use std::fmt;
use std::time::Duration;

/// Boxed error payload carried through the stack.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by a task body.
#[derive(Debug)]
pub enum TaskError {
    /// An error belonging to the caller's own domain taxonomy. Surfaces
    /// from `submit` unchanged, preserving causality for upstream handling.
    Domain(BoxError),
    /// Any other task failure. Surfaces as [`SubmitError::Internal`].
    Other(BoxError),
}

impl TaskError {
    /// Wrap a caller-domain error.
    pub fn domain(err: impl Into<BoxError>) -> Self {
        TaskError::Domain(err.into())
    }

    /// Wrap an unclassified error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        TaskError::Other(err.into())
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Domain(e) => write!(f, "task domain error: {}", e),
            TaskError::Other(e) => write!(f, "task error: {}", e),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Domain(e) | TaskError::Other(e) => Some(e.as_ref()),
        }
    }
}

/// Classified failure surfaced by `Executor::submit`.
///
/// The classification is exhaustive and order-sensitive: saturation is
/// reported before breaker rejection, which is reported before timeout;
/// caller-domain errors pass through unchanged; everything else is internal.
#[derive(Debug)]
pub enum SubmitError {
    /// The admission gate or isolated pool is saturated. Retryable with
    /// backoff.
    LimitExceeded {
        /// Scope the task was submitted under.
        scope: String,
    },
    /// The circuit breaker is open and rejected the call. Retryable after
    /// the configured open-state wait.
    CircuitOpen {
        /// Scope the task was submitted under.
        scope: String,
    },
    /// The task ran past its deadline. The task itself may still be
    /// running; its result is discarded. Retryable, ideally with reduced
    /// load.
    Timeout {
        /// Scope the task was submitted under.
        scope: String,
        /// The deadline that was exceeded.
        deadline: Duration,
    },
    /// An error from the caller's own domain, passed through unchanged.
    Domain(BoxError),
    /// Unclassified failure (task error outside the caller taxonomy, or a
    /// task panic). Not assumed retryable.
    Internal(BoxError),
}

impl SubmitError {
    /// Whether a caller may reasonably retry the submission.
    ///
    /// Saturation, breaker rejection, and timeouts are transient; domain
    /// and internal failures are not assumed to be.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::LimitExceeded { .. }
                | SubmitError::CircuitOpen { .. }
                | SubmitError::Timeout { .. }
        )
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::LimitExceeded { scope } => {
                write!(f, "concurrency limit exceeded for scope {:?}", scope)
            }
            SubmitError::CircuitOpen { scope } => {
                write!(f, "circuit breaker open for scope {:?}; rejecting task", scope)
            }
            SubmitError::Timeout { scope, deadline } => write!(
                f,
                "task exceeded deadline of {:?} for scope {:?}",
                deadline, scope
            ),
            SubmitError::Domain(e) => e.fmt(f),
            SubmitError::Internal(e) => write!(f, "internal task failure: {}", e),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Domain(e) | SubmitError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Fatal configuration error raised during registry construction.
///
/// Configuration problems are never deferred to call time; a registry that
/// fails to build leaves the engine unusable by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A scope override used an invalid scope name.
    MalformedScope(String),
    /// Two scope overrides share a name (case-insensitively).
    DuplicateScope(String),
    /// `sliding_window_task_count` missing for a count-based window.
    MissingSlidingWindowTaskCount,
    /// `sliding_window_duration` missing for a time-based window.
    MissingSlidingWindowDuration,
    /// A required field of an enabled policy was left unset.
    MissingField {
        /// The policy the field belongs to.
        policy: &'static str,
        /// The unset field.
        field: &'static str,
    },
    /// A field held a value outside its valid range.
    InvalidValue {
        /// The policy the field belongs to.
        policy: &'static str,
        /// The offending field.
        field: &'static str,
        /// Human-readable constraint that was violated.
        constraint: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MalformedScope(scope) => {
                write!(f, "malformed scope syntax: {:?}", scope)
            }
            ConfigError::DuplicateScope(scope) => {
                write!(f, "duplicate scope registration: {:?}", scope)
            }
            ConfigError::MissingSlidingWindowTaskCount => write!(
                f,
                "sliding_window_task_count must be provided when sliding_window_kind is COUNT_BASED"
            ),
            ConfigError::MissingSlidingWindowDuration => write!(
                f,
                "sliding_window_duration must be provided when sliding_window_kind is TIME_BASED"
            ),
            ConfigError::MissingField { policy, field } => {
                write!(f, "{}.{} must be set when the policy is enabled", policy, field)
            }
            ConfigError::InvalidValue {
                policy,
                field,
                constraint,
            } => write!(f, "{}.{} is invalid: {}", policy, field, constraint),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<crate::domain::scope::MalformedScope> for ConfigError {
    fn from(e: crate::domain::scope::MalformedScope) -> Self {
        ConfigError::MalformedScope(e.0)
    }
}

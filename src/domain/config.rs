//! Configuration model for the policy stack.
//!
//! Each policy kind has a sparse configuration struct whose fields are all
//! optional. Sparse configs support two operations:
//!
//! - `with_defaults()` — a fully populated baseline with documented values;
//! - `merged(&self, overrides)` — a non-destructive, field-by-field merge:
//!   every `Some` field of the override replaces the destination field, every
//!   `None` field leaves it unchanged, and neither input is mutated.
//!
//! A sparse config is turned into validated runtime parameters by `build()`
//! at registration time. Building fails with a [`ConfigError`] when an
//! enabled policy is missing a required field or holds an out-of-range
//! value; those errors are fatal and prevent the registry from constructing.
//!
//! A policy whose `enabled` field is unset counts as disabled, so a bare
//! default configuration applies no policies at all until the caller opts
//! in per policy.

use crate::domain::failure::ConfigError;
use std::time::Duration;

/// Default maximum concurrent admissions.
const DEFAULT_MAX_CONCURRENT: u32 = 25;
/// Default admission wait. Zero means fail-fast on saturation.
const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(0);

/// Default isolated-pool queue capacity.
const DEFAULT_QUEUE_CAPACITY: u32 = 1;
/// Default keep-alive for pool threads above the core count.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(20);

const DEFAULT_FAILURE_RATE_THRESHOLD: u8 = 50;
const DEFAULT_SLOW_CALL_RATE_THRESHOLD: u8 = 100;
const DEFAULT_SLOW_CALL_DURATION_THRESHOLD: Duration = Duration::from_millis(30_000);
const DEFAULT_PERMITTED_CALLS_IN_HALF_OPEN: u32 = 10;
/// Zero means the breaker may stay half-open until all trial calls finish.
const DEFAULT_MAX_WAIT_IN_HALF_OPEN: Duration = Duration::from_millis(0);
const DEFAULT_SLIDING_WINDOW_TASK_COUNT: u32 = 100;
const DEFAULT_SLIDING_WINDOW_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_MINIMUM_CALLS: u32 = 100;
const DEFAULT_WAIT_DURATION_OPEN: Duration = Duration::from_millis(60_000);

const DEFAULT_DEADLINE_TIMEOUT: Duration = Duration::from_millis(30_000);

fn hardware_parallelism() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn require<T: Copy>(
    value: Option<T>,
    policy: &'static str,
    field: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingField { policy, field })
}

fn check_rate(
    value: u8,
    policy: &'static str,
    field: &'static str,
) -> Result<u8, ConfigError> {
    if (1..=100).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            policy,
            field,
            constraint: "must be between 1 and 100",
        })
    }
}

fn check_at_least_one(
    value: u32,
    policy: &'static str,
    field: &'static str,
) -> Result<u32, ConfigError> {
    if value >= 1 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            policy,
            field,
            constraint: "must be at least 1",
        })
    }
}

/// Admission (concurrency) limiter configuration.
///
/// Bounds the number of tasks admitted into a scope at once, with an
/// optional bounded wait for a free slot. A zero wait fails fast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct AdmissionConfig {
    /// Whether the admission limiter applies. Unset counts as disabled.
    pub enabled: Option<bool>,
    /// Maximum parallel admissions.
    pub max_concurrent: Option<u32>,
    /// Maximum time to block waiting to enter a saturated gate.
    pub max_wait: Option<Duration>,
}

impl AdmissionConfig {
    /// Fully populated baseline: `max_concurrent=25`, `max_wait=0`.
    pub fn with_defaults() -> Self {
        Self {
            enabled: None,
            max_concurrent: Some(DEFAULT_MAX_CONCURRENT),
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }

    /// Non-destructive sparse merge; `overrides` wins field-by-field.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            enabled: overrides.enabled.or(self.enabled),
            max_concurrent: overrides.max_concurrent.or(self.max_concurrent),
            max_wait: overrides.max_wait.or(self.max_wait),
        }
    }

    /// Whether the policy is explicitly enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }

    /// Validate into runtime parameters; `None` when disabled.
    pub fn build(&self) -> Result<Option<AdmissionParams>, ConfigError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let max_concurrent = require(self.max_concurrent, "admission", "max_concurrent")?;
        let max_concurrent = check_at_least_one(max_concurrent, "admission", "max_concurrent")?;
        let max_wait = require(self.max_wait, "admission", "max_wait")?;
        Ok(Some(AdmissionParams {
            max_concurrent,
            max_wait,
        }))
    }
}

/// Validated admission limiter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionParams {
    /// Maximum parallel admissions.
    pub max_concurrent: u32,
    /// Bounded wait for a slot; zero fails fast.
    pub max_wait: Duration,
}

/// Isolated-pool (thread-pool bulkhead) configuration.
///
/// Dispatches task execution onto a separate bounded worker pool with a
/// bounded queue, rather than the submitting thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct IsolatedPoolConfig {
    /// Whether the isolated pool applies. Unset counts as disabled.
    pub enabled: Option<bool>,
    /// Maximum worker threads.
    pub max_threads: Option<u32>,
    /// Core worker threads, kept alive indefinitely.
    pub core_threads: Option<u32>,
    /// Capacity of the pending-task queue.
    pub queue_capacity: Option<u32>,
    /// Idle time after which threads above the core count exit.
    pub keep_alive: Option<Duration>,
}

impl IsolatedPoolConfig {
    /// Fully populated baseline: core and max thread counts equal to the
    /// hardware parallelism, `queue_capacity=1`, `keep_alive=20ms`.
    pub fn with_defaults() -> Self {
        let parallelism = hardware_parallelism();
        Self {
            enabled: None,
            max_threads: Some(parallelism),
            core_threads: Some(parallelism),
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            keep_alive: Some(DEFAULT_KEEP_ALIVE),
        }
    }

    /// Non-destructive sparse merge; `overrides` wins field-by-field.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            enabled: overrides.enabled.or(self.enabled),
            max_threads: overrides.max_threads.or(self.max_threads),
            core_threads: overrides.core_threads.or(self.core_threads),
            queue_capacity: overrides.queue_capacity.or(self.queue_capacity),
            keep_alive: overrides.keep_alive.or(self.keep_alive),
        }
    }

    /// Whether the policy is explicitly enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }

    /// Validate into runtime parameters; `None` when disabled.
    pub fn build(&self) -> Result<Option<PoolParams>, ConfigError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let max_threads = require(self.max_threads, "isolated_pool", "max_threads")?;
        let core_threads = require(self.core_threads, "isolated_pool", "core_threads")?;
        let core_threads = check_at_least_one(core_threads, "isolated_pool", "core_threads")?;
        if max_threads < core_threads {
            return Err(ConfigError::InvalidValue {
                policy: "isolated_pool",
                field: "max_threads",
                constraint: "must be at least core_threads",
            });
        }
        let queue_capacity = require(self.queue_capacity, "isolated_pool", "queue_capacity")?;
        let queue_capacity = check_at_least_one(queue_capacity, "isolated_pool", "queue_capacity")?;
        let keep_alive = require(self.keep_alive, "isolated_pool", "keep_alive")?;
        Ok(Some(PoolParams {
            max_threads,
            core_threads,
            queue_capacity,
            keep_alive,
        }))
    }
}

/// Validated isolated-pool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    /// Maximum worker threads.
    pub max_threads: u32,
    /// Core worker threads.
    pub core_threads: u32,
    /// Pending-task queue capacity.
    pub queue_capacity: u32,
    /// Idle timeout for threads above the core count.
    pub keep_alive: Duration,
}

/// Sliding-window kind for circuit-breaker outcome tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlidingWindowKind {
    /// The last `sliding_window_task_count` calls are aggregated.
    #[cfg_attr(feature = "serde", serde(rename = "COUNT_BASED"))]
    CountBased,
    /// Calls from the last `sliding_window_duration` are aggregated.
    #[cfg_attr(feature = "serde", serde(rename = "TIME_BASED"))]
    TimeBased,
}

/// Sliding-window size, strongly typed by kind.
///
/// Count and duration are kept as distinct fields in the sparse config and
/// collapse into this enum at build time, so a count can never be read as
/// seconds or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidingWindow {
    /// Aggregate the last N calls.
    Count(u32),
    /// Aggregate calls from the last window of time.
    Time(Duration),
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct CircuitBreakerConfig {
    /// Whether the circuit breaker applies. Unset counts as disabled.
    pub enabled: Option<bool>,
    /// Failure-rate percentage (1-100) at or above which the breaker opens.
    pub failure_rate_threshold: Option<u8>,
    /// Slow-call-rate percentage (1-100) at or above which the breaker opens.
    pub slow_call_rate_threshold: Option<u8>,
    /// Duration above which a call counts as slow.
    pub slow_call_duration_threshold: Option<Duration>,
    /// Trial calls permitted while half-open.
    pub permitted_calls_in_half_open: Option<u32>,
    /// Longest time the breaker may stay half-open; zero means until all
    /// trial calls complete.
    pub max_wait_in_half_open: Option<Duration>,
    /// Whether outcomes are aggregated by call count or by time.
    pub sliding_window_kind: Option<SlidingWindowKind>,
    /// Window size in calls. Required when the kind is count-based.
    pub sliding_window_task_count: Option<u32>,
    /// Window size in time. Required when the kind is time-based.
    pub sliding_window_duration: Option<Duration>,
    /// Observations required before rates are evaluated at all.
    pub minimum_calls: Option<u32>,
    /// Time spent open before half-open trials may begin.
    pub wait_duration_open: Option<Duration>,
    /// Whether the open-to-half-open transition becomes visible to state
    /// reads on its own, or only when a call is attempted.
    pub auto_open_to_half_open: Option<bool>,
}

impl CircuitBreakerConfig {
    /// Fully populated baseline: failure rate 50%, slow-call rate 100%,
    /// slow-call threshold 30s, 10 half-open trials, count-based window of
    /// 100 calls, 100 minimum calls, 60s open wait, manual half-open
    /// transition.
    pub fn with_defaults() -> Self {
        Self {
            enabled: None,
            failure_rate_threshold: Some(DEFAULT_FAILURE_RATE_THRESHOLD),
            slow_call_rate_threshold: Some(DEFAULT_SLOW_CALL_RATE_THRESHOLD),
            slow_call_duration_threshold: Some(DEFAULT_SLOW_CALL_DURATION_THRESHOLD),
            permitted_calls_in_half_open: Some(DEFAULT_PERMITTED_CALLS_IN_HALF_OPEN),
            max_wait_in_half_open: Some(DEFAULT_MAX_WAIT_IN_HALF_OPEN),
            sliding_window_kind: Some(SlidingWindowKind::CountBased),
            sliding_window_task_count: Some(DEFAULT_SLIDING_WINDOW_TASK_COUNT),
            sliding_window_duration: Some(DEFAULT_SLIDING_WINDOW_DURATION),
            minimum_calls: Some(DEFAULT_MINIMUM_CALLS),
            wait_duration_open: Some(DEFAULT_WAIT_DURATION_OPEN),
            auto_open_to_half_open: Some(false),
        }
    }

    /// Non-destructive sparse merge; `overrides` wins field-by-field.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            enabled: overrides.enabled.or(self.enabled),
            failure_rate_threshold: overrides
                .failure_rate_threshold
                .or(self.failure_rate_threshold),
            slow_call_rate_threshold: overrides
                .slow_call_rate_threshold
                .or(self.slow_call_rate_threshold),
            slow_call_duration_threshold: overrides
                .slow_call_duration_threshold
                .or(self.slow_call_duration_threshold),
            permitted_calls_in_half_open: overrides
                .permitted_calls_in_half_open
                .or(self.permitted_calls_in_half_open),
            max_wait_in_half_open: overrides
                .max_wait_in_half_open
                .or(self.max_wait_in_half_open),
            sliding_window_kind: overrides.sliding_window_kind.or(self.sliding_window_kind),
            sliding_window_task_count: overrides
                .sliding_window_task_count
                .or(self.sliding_window_task_count),
            sliding_window_duration: overrides
                .sliding_window_duration
                .or(self.sliding_window_duration),
            minimum_calls: overrides.minimum_calls.or(self.minimum_calls),
            wait_duration_open: overrides.wait_duration_open.or(self.wait_duration_open),
            auto_open_to_half_open: overrides
                .auto_open_to_half_open
                .or(self.auto_open_to_half_open),
        }
    }

    /// Whether the policy is explicitly enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }

    /// Validate into runtime parameters; `None` when disabled.
    ///
    /// Fails when a count-based window has no task count or a time-based
    /// window has no duration.
    pub fn build(&self) -> Result<Option<BreakerParams>, ConfigError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let kind = require(
            self.sliding_window_kind,
            "circuit_breaker",
            "sliding_window_kind",
        )?;
        let window = match kind {
            SlidingWindowKind::CountBased => SlidingWindow::Count(
                self.sliding_window_task_count
                    .ok_or(ConfigError::MissingSlidingWindowTaskCount)?,
            ),
            SlidingWindowKind::TimeBased => SlidingWindow::Time(
                self.sliding_window_duration
                    .ok_or(ConfigError::MissingSlidingWindowDuration)?,
            ),
        };
        let failure_rate_threshold = check_rate(
            require(
                self.failure_rate_threshold,
                "circuit_breaker",
                "failure_rate_threshold",
            )?,
            "circuit_breaker",
            "failure_rate_threshold",
        )?;
        let slow_call_rate_threshold = check_rate(
            require(
                self.slow_call_rate_threshold,
                "circuit_breaker",
                "slow_call_rate_threshold",
            )?,
            "circuit_breaker",
            "slow_call_rate_threshold",
        )?;
        let permitted_calls_in_half_open = check_at_least_one(
            require(
                self.permitted_calls_in_half_open,
                "circuit_breaker",
                "permitted_calls_in_half_open",
            )?,
            "circuit_breaker",
            "permitted_calls_in_half_open",
        )?;
        let minimum_calls = check_at_least_one(
            require(self.minimum_calls, "circuit_breaker", "minimum_calls")?,
            "circuit_breaker",
            "minimum_calls",
        )?;
        Ok(Some(BreakerParams {
            failure_rate_threshold,
            slow_call_rate_threshold,
            slow_call_duration_threshold: require(
                self.slow_call_duration_threshold,
                "circuit_breaker",
                "slow_call_duration_threshold",
            )?,
            permitted_calls_in_half_open,
            max_wait_in_half_open: require(
                self.max_wait_in_half_open,
                "circuit_breaker",
                "max_wait_in_half_open",
            )?,
            window,
            minimum_calls,
            wait_duration_open: require(
                self.wait_duration_open,
                "circuit_breaker",
                "wait_duration_open",
            )?,
            auto_open_to_half_open: require(
                self.auto_open_to_half_open,
                "circuit_breaker",
                "auto_open_to_half_open",
            )?,
        }))
    }
}

/// Validated circuit-breaker parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerParams {
    /// Failure-rate percentage at or above which the breaker opens.
    pub failure_rate_threshold: u8,
    /// Slow-call-rate percentage at or above which the breaker opens.
    pub slow_call_rate_threshold: u8,
    /// Duration above which a call counts as slow.
    pub slow_call_duration_threshold: Duration,
    /// Trial calls permitted while half-open.
    pub permitted_calls_in_half_open: u32,
    /// Longest half-open residence; zero means unbounded.
    pub max_wait_in_half_open: Duration,
    /// Outcome aggregation window.
    pub window: SlidingWindow,
    /// Observations required before rates are evaluated.
    pub minimum_calls: u32,
    /// Time spent open before half-open trials may begin.
    pub wait_duration_open: Duration,
    /// Whether open-to-half-open is visible to state reads on its own.
    pub auto_open_to_half_open: bool,
}

/// Deadline limiter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct DeadlineConfig {
    /// Whether the deadline limiter applies. Unset counts as disabled.
    pub enabled: Option<bool>,
    /// Time allowed before a task is timed out.
    pub timeout: Option<Duration>,
}

impl DeadlineConfig {
    /// Fully populated baseline: `timeout=30s`.
    pub fn with_defaults() -> Self {
        Self {
            enabled: None,
            timeout: Some(DEFAULT_DEADLINE_TIMEOUT),
        }
    }

    /// Non-destructive sparse merge; `overrides` wins field-by-field.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            enabled: overrides.enabled.or(self.enabled),
            timeout: overrides.timeout.or(self.timeout),
        }
    }

    /// Whether the policy is explicitly enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }

    /// Validate into runtime parameters; `None` when disabled.
    pub fn build(&self) -> Result<Option<DeadlineParams>, ConfigError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let timeout = require(self.timeout, "deadline", "timeout")?;
        if timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                policy: "deadline",
                field: "timeout",
                constraint: "must be greater than zero",
            });
        }
        Ok(Some(DeadlineParams { timeout }))
    }
}

/// Validated deadline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineParams {
    /// Time allowed before a task is timed out.
    pub timeout: Duration,
}

/// The full policy set for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ScopePolicyConfig {
    /// Admission limiter.
    pub admission: AdmissionConfig,
    /// Isolated worker pool.
    pub isolated_pool: IsolatedPoolConfig,
    /// Circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Deadline limiter.
    pub deadline: DeadlineConfig,
}

impl ScopePolicyConfig {
    /// Baseline with every policy's fields populated (and every policy
    /// disabled until explicitly enabled).
    pub fn with_defaults() -> Self {
        Self {
            admission: AdmissionConfig::with_defaults(),
            isolated_pool: IsolatedPoolConfig::with_defaults(),
            circuit_breaker: CircuitBreakerConfig::with_defaults(),
            deadline: DeadlineConfig::with_defaults(),
        }
    }

    /// Non-destructive sparse merge of all four policies.
    pub fn merged(&self, overrides: &Self) -> Self {
        Self {
            admission: self.admission.merged(&overrides.admission),
            isolated_pool: self.isolated_pool.merged(&overrides.isolated_pool),
            circuit_breaker: self.circuit_breaker.merged(&overrides.circuit_breaker),
            deadline: self.deadline.merged(&overrides.deadline),
        }
    }

    /// Validate all four policies into runtime parameters.
    pub fn build(&self) -> Result<ResolvedPolicies, ConfigError> {
        Ok(ResolvedPolicies {
            admission: self.admission.build()?,
            pool: self.isolated_pool.build()?,
            breaker: self.circuit_breaker.build()?,
            deadline: self.deadline.build()?,
        })
    }
}

/// Validated runtime parameters for a scope; `None` per disabled policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPolicies {
    /// Admission limiter parameters, when enabled.
    pub admission: Option<AdmissionParams>,
    /// Isolated pool parameters, when enabled.
    pub pool: Option<PoolParams>,
    /// Circuit breaker parameters, when enabled.
    pub breaker: Option<BreakerParams>,
    /// Deadline parameters, when enabled.
    pub deadline: Option<DeadlineParams>,
}

/// One scope override entry of the startup configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ScopeOverride {
    /// Dot-delimited scope name the override applies to.
    pub scope: String,
    /// Sparse policy overrides for the scope.
    pub config: ScopePolicyConfig,
}

/// The hierarchical configuration surface supplied once at startup.
///
/// Fields omitted in `defaults` fall back to hard-coded baselines; fields
/// omitted in a scope override inherit from the already-merged defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ExecutorConfig {
    /// Global sparse overrides applied on top of the baselines.
    pub defaults: ScopePolicyConfig,
    /// Per-scope sparse overrides applied on top of the merged defaults.
    pub scopes: Vec<ScopeOverride>,
}

//! Scope registry: configuration profiles and their policy instances.
//!
//! The registry is built once at startup and is immutable afterwards. Every
//! scope override is validated, merged over the defaults, and expanded into
//! live policy instances (gate, pool, breaker) at registration time, so a
//! submission never pays for construction or finds out about a bad config.
//!
//! Resolution walks the registered names longest-first: an exact
//! case-insensitive match wins, then the longest registered name contained
//! in the query (case-sensitive), then the `DEFAULT` profile. The resolved
//! per-call view is memoized per query string.

use crate::application::admission::AdmissionGate;
use crate::application::breaker::CircuitBreaker;
use crate::application::pool::IsolatedPool;
use crate::application::ports::Clock;
use crate::domain::config::{DeadlineParams, ExecutorConfig, ResolvedPolicies, ScopePolicyConfig};
use crate::domain::failure::ConfigError;
use crate::domain::scope::{scope_eq, ScopeName, DEFAULT_SCOPE};
use std::sync::Arc;
use std::time::Duration;

/// Resolved, memoized view of a submission's scope, handed to task bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConfig {
    /// Name of the registered profile the submission resolved to.
    pub scope: String,
    /// Deadline the task runs under, when the deadline policy is enabled.
    pub deadline: Option<Duration>,
}

/// Live policy instances for one registered scope.
///
/// All submissions resolving to the same profile share these instances:
/// they fill the same gate, queue into the same pool, and trip the same
/// breaker.
#[derive(Debug)]
pub struct ScopeRuntime {
    name: String,
    gate: Option<AdmissionGate>,
    pool: Option<IsolatedPool>,
    breaker: Option<CircuitBreaker>,
    deadline: Option<DeadlineParams>,
}

impl ScopeRuntime {
    fn build(name: String, policies: ResolvedPolicies, clock: &Arc<dyn Clock>) -> Self {
        Self {
            gate: policies.admission.map(AdmissionGate::new),
            pool: policies.pool.map(|p| IsolatedPool::new(name.clone(), p)),
            breaker: policies
                .breaker
                .map(|p| CircuitBreaker::new(name.clone(), p, Arc::clone(clock))),
            deadline: policies.deadline,
            name,
        }
    }

    /// The registered scope name this profile was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission gate, when enabled.
    pub fn gate(&self) -> Option<&AdmissionGate> {
        self.gate.as_ref()
    }

    /// Isolated worker pool, when enabled.
    pub fn pool(&self) -> Option<&IsolatedPool> {
        self.pool.as_ref()
    }

    /// Circuit breaker, when enabled.
    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    /// Deadline parameters, when enabled.
    pub fn deadline(&self) -> Option<DeadlineParams> {
        self.deadline
    }
}

/// Immutable registry of scope profiles with memoized resolution.
#[derive(Debug)]
pub struct ScopeRegistry {
    /// Registered profiles, longest name first. Ties keep registration
    /// order. The fallback profile is held separately and never scanned.
    profiles: Vec<Arc<ScopeRuntime>>,
    fallback: Arc<ScopeRuntime>,
    call_configs: dashmap::DashMap<String, Arc<CallConfig>, ahash::RandomState>,
}

impl ScopeRegistry {
    /// Validate the configuration and build every profile.
    ///
    /// Fails on a malformed scope name, a case-insensitive duplicate, or
    /// any policy that is enabled but incompletely or invalidly specified.
    pub fn new(config: &ExecutorConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let base = ScopePolicyConfig::with_defaults().merged(&config.defaults);

        let mut fallback_config = base.clone();
        let mut named: Vec<(ScopeName, ScopePolicyConfig)> = Vec::new();
        let mut seen_default = false;

        for entry in &config.scopes {
            let name = ScopeName::new(entry.scope.clone())?;
            if scope_eq(name.as_str(), DEFAULT_SCOPE) {
                // Overriding DEFAULT reshapes the fallback profile rather
                // than entering the scan list.
                if seen_default {
                    return Err(ConfigError::DuplicateScope(entry.scope.clone()));
                }
                seen_default = true;
                fallback_config = base.merged(&entry.config);
                continue;
            }
            if named
                .iter()
                .any(|(existing, _)| scope_eq(existing.as_str(), name.as_str()))
            {
                return Err(ConfigError::DuplicateScope(entry.scope.clone()));
            }
            named.push((name, base.merged(&entry.config)));
        }

        let mut profiles = Vec::with_capacity(named.len());
        for (name, merged) in named {
            let policies = merged.build()?;
            tracing::info!(
                scope = %name,
                admission = policies.admission.is_some(),
                pool = policies.pool.is_some(),
                breaker = policies.breaker.is_some(),
                deadline = policies.deadline.is_some(),
                "registered scope profile"
            );
            profiles.push(Arc::new(ScopeRuntime::build(
                name.as_str().to_string(),
                policies,
                &clock,
            )));
        }
        // Stable sort: equal lengths keep their registration order.
        profiles.sort_by(|a, b| b.name().len().cmp(&a.name().len()));

        let fallback_policies = fallback_config.build()?;
        let fallback = Arc::new(ScopeRuntime::build(
            DEFAULT_SCOPE.to_string(),
            fallback_policies,
            &clock,
        ));

        Ok(Self {
            profiles,
            fallback,
            call_configs: dashmap::DashMap::with_hasher(ahash::RandomState::new()),
        })
    }

    /// Resolve a query string to a profile.
    ///
    /// Exact case-insensitive match first, then the longest registered name
    /// contained in the query (case-sensitive), then the fallback. Always
    /// succeeds.
    pub fn resolve(&self, query: &str) -> Arc<ScopeRuntime> {
        if let Some(profile) = self.profiles.iter().find(|p| scope_eq(p.name(), query)) {
            return Arc::clone(profile);
        }
        if let Some(profile) = self.profiles.iter().find(|p| query.contains(p.name())) {
            return Arc::clone(profile);
        }
        Arc::clone(&self.fallback)
    }

    /// Memoized per-call view for a query string.
    ///
    /// The first lookup for a given string resolves and caches it; later
    /// lookups return the same shared value.
    pub fn call_config(&self, query: &str) -> Arc<CallConfig> {
        if let Some(existing) = self.call_configs.get(query) {
            return Arc::clone(&existing);
        }
        let runtime = self.resolve(query);
        tracing::debug!(query, scope = runtime.name(), "memoizing scope resolution");
        let config = Arc::new(CallConfig {
            scope: runtime.name().to_string(),
            deadline: runtime.deadline().map(|d| d.timeout),
        });
        Arc::clone(
            &self
                .call_configs
                .entry(query.to_string())
                .or_insert(config),
        )
    }

    /// The fallback profile.
    pub fn fallback(&self) -> &Arc<ScopeRuntime> {
        &self.fallback
    }

    /// Number of registered profiles, not counting the fallback.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no scope overrides were registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

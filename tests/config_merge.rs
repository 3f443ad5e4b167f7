//! Configuration layering behavior observed through the public API.

use scoped_executor::{
    AdmissionConfig, CircuitBreakerConfig, ConfigError, DeadlineConfig, Executor, ExecutorConfig,
    ScopeOverride, ScopePolicyConfig, SlidingWindowKind,
};
use std::time::Duration;

fn deadline(timeout: Duration) -> DeadlineConfig {
    DeadlineConfig {
        enabled: Some(true),
        timeout: Some(timeout),
    }
}

#[test]
fn test_scope_inherits_defaults_field_by_field() {
    // Defaults enable a deadline; the scope override changes only the
    // timeout and must inherit the enabled flag.
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig {
            deadline: deadline(Duration::from_secs(10)),
            ..ScopePolicyConfig::default()
        },
        scopes: vec![ScopeOverride {
            scope: "payments".to_string(),
            config: ScopePolicyConfig {
                deadline: DeadlineConfig {
                    enabled: None,
                    timeout: Some(Duration::from_secs(1)),
                },
                ..ScopePolicyConfig::default()
            },
        }],
    };
    let executor = Executor::new(&config).unwrap();

    assert_eq!(
        executor.registry().call_config("payments").deadline,
        Some(Duration::from_secs(1))
    );
    // Unrelated scopes keep the default timeout.
    assert_eq!(
        executor.registry().call_config("inventory").deadline,
        Some(Duration::from_secs(10))
    );
}

#[test]
fn test_scope_can_disable_an_inherited_policy() {
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig {
            deadline: deadline(Duration::from_secs(10)),
            ..ScopePolicyConfig::default()
        },
        scopes: vec![ScopeOverride {
            scope: "batch".to_string(),
            config: ScopePolicyConfig {
                deadline: DeadlineConfig {
                    enabled: Some(false),
                    timeout: None,
                },
                ..ScopePolicyConfig::default()
            },
        }],
    };
    let executor = Executor::new(&config).unwrap();

    assert_eq!(executor.registry().call_config("batch").deadline, None);
    assert_eq!(
        executor.registry().call_config("other").deadline,
        Some(Duration::from_secs(10))
    );
}

#[test]
fn test_unset_fields_fall_back_to_baselines() {
    // Enabling a policy without specifying its fields uses the documented
    // baseline values, so registration succeeds.
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig {
            admission: AdmissionConfig {
                enabled: Some(true),
                max_concurrent: None,
                max_wait: None,
            },
            ..ScopePolicyConfig::default()
        },
        scopes: vec![],
    };
    assert!(Executor::new(&config).is_ok());
}

#[test]
fn test_invalid_breaker_threshold_is_fatal_at_startup() {
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig {
            circuit_breaker: CircuitBreakerConfig {
                enabled: Some(true),
                failure_rate_threshold: Some(0),
                sliding_window_kind: Some(SlidingWindowKind::CountBased),
                ..CircuitBreakerConfig::default()
            },
            ..ScopePolicyConfig::default()
        },
        scopes: vec![],
    };

    // Configuration problems surface when the executor is built, never at
    // submission time.
    match Executor::new(&config) {
        Err(ConfigError::InvalidValue {
            policy: "circuit_breaker",
            field: "failure_rate_threshold",
            ..
        }) => {}
        other => panic!("expected threshold error, got {:?}", other),
    }
}

#[test]
fn test_merge_does_not_leak_between_scopes() {
    // Two scopes overriding different fields must not see each other's
    // overrides.
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig::default(),
        scopes: vec![
            ScopeOverride {
                scope: "alpha".to_string(),
                config: ScopePolicyConfig {
                    deadline: deadline(Duration::from_secs(1)),
                    ..ScopePolicyConfig::default()
                },
            },
            ScopeOverride {
                scope: "beta".to_string(),
                config: ScopePolicyConfig {
                    deadline: deadline(Duration::from_secs(2)),
                    ..ScopePolicyConfig::default()
                },
            },
        ],
    };
    let executor = Executor::new(&config).unwrap();

    assert_eq!(
        executor.registry().call_config("alpha").deadline,
        Some(Duration::from_secs(1))
    );
    assert_eq!(
        executor.registry().call_config("beta").deadline,
        Some(Duration::from_secs(2))
    );
    assert_eq!(executor.registry().call_config("gamma").deadline, None);
}

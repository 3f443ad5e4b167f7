//! Basic example demonstrating scoped submission with a deadline.
//!
//! Run with: `cargo run --example basic`

use scoped_executor::{
    AdmissionConfig, DeadlineConfig, Executor, ExecutorConfig, ScopeOverride, ScopePolicyConfig,
};
use std::thread;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt().init();

    // "payments" gets a tight concurrency bound and a short deadline;
    // everything else runs unrestricted under the DEFAULT profile.
    let config = ExecutorConfig {
        defaults: ScopePolicyConfig::default(),
        scopes: vec![ScopeOverride {
            scope: "payments".to_string(),
            config: ScopePolicyConfig {
                admission: AdmissionConfig {
                    enabled: Some(true),
                    max_concurrent: Some(2),
                    max_wait: Some(Duration::ZERO),
                },
                deadline: DeadlineConfig {
                    enabled: Some(true),
                    timeout: Some(Duration::from_millis(200)),
                },
                ..ScopePolicyConfig::default()
            },
        }],
    };
    let executor = Executor::new(&config).expect("valid configuration");

    println!("=== Scoped Execution Example ===\n");

    // Sub-scopes resolve to the "payments" profile by containment.
    let result = executor.submit("payments.refund", |call| {
        println!("running under profile {:?}, deadline {:?}", call.scope, call.deadline);
        Ok(())
    });
    println!("fast refund: {:?}\n", result);

    // A slow task is abandoned at the deadline.
    let result = executor.submit("payments.refund", |_| {
        thread::sleep(Duration::from_secs(2));
        Ok(())
    });
    println!("slow refund: {:?}\n", result);

    // Unregistered scopes fall back to DEFAULT, which has no policies.
    let result = executor.submit("inventory.sync", |call| {
        println!("running under profile {:?}", call.scope);
        Ok(())
    });
    println!("inventory sync: {:?}\n", result);

    let snapshot = executor.metrics().snapshot();
    println!(
        "succeeded: {}, timed out: {}, rejection rate: {:.0}%",
        snapshot.tasks_succeeded,
        snapshot.tasks_timed_out,
        snapshot.rejection_rate() * 100.0
    );
}

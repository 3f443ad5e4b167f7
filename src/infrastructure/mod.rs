//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)

pub mod clock;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for testing
/// time-dependent policy behavior.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// scoped-executor = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;

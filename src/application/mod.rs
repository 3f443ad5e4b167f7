//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Scope registry (profile registration, resolution, memoized call views)
//! - Policy stages (admission gate, isolated pool, circuit breaker, deadline)
//! - Executor (submission boundary and failure classification)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod admission;
pub mod breaker;
pub mod deadline;
pub mod executor;
pub mod metrics;
pub mod pool;
pub mod ports;
pub mod registry;

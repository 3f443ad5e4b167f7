//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the execution
//! engine:
//! - Scope-name syntax and equality rules
//! - The sparse configuration model, its defaults, and the merge law
//! - The failure taxonomy surfaced to callers
//!
//! All types in this layer are pure and easily testable.

pub mod config;
pub mod failure;
pub mod scope;

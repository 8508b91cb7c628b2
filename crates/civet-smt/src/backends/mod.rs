//! Concrete oracle backends.
//!
//! The engine is generic over [`crate::solver::TheorySolver`]; production
//! deployments plug in an external SMT service, while the bounded backend
//! here keeps the crate self-contained for tests and benchmarks.

pub mod bounded;

pub use bounded::{BackendError, BoundedSolver};

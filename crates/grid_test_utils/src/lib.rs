//! # Grid Test Utilities
//!
//! Shared testing utilities for the grid crates:
//! - Determinism test harness
//! - Fixture helpers for grids, units, and buildings
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;

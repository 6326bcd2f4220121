//! Walkthrough scenarios.
//!
//! Each scenario wires real engine components to the in-memory service and
//! prints what happens, step by step.

pub mod dashboard;
pub mod pagination;
pub mod preference;
pub mod stale_race;

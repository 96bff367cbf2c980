// src/dag/mod.rs

//! Dependency graph construction and validation.
//!
//! - [`graph`] holds the arena of tasks with resolved before/after edges and
//!   the synthetic root.
//! - [`validate`] rejects cycles and blocking-on-deferred-blocking
//!   dependencies before anything runs.

pub mod graph;
pub mod validate;

pub(crate) use graph::{NodeId, TaskGraph, TaskState};
pub(crate) use validate::validate;

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error(
        "Synchronous task '{task}' cannot depend on deferred synchronous task '{dependency}'"
    )]
    SyncOnDeferred { task: String, dependency: String },

    #[error("run must be invoked from the thread that built the runner")]
    NotOwningThread,

    #[error(
        "Initialization failed for {} task(s): {}",
        .failures.len(),
        .failures.join("; ")
    )]
    InitFailed { failures: Vec<String> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, InitdagError>;

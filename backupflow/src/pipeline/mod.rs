//! Workflow building and execution.
//!
//! This module provides:
//! - The workflow kinds known to the factory
//! - A builder validating stage chains
//! - The three-pass workflow runner
//! - The factory composing the standard restore and verify chains

mod builder;
mod factory;
mod workflow;

pub use builder::WorkflowBuilder;
pub use factory::{StandardWorkflowFactory, WorkflowFactory};
pub use workflow::Workflow;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of maintenance workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Restore a backup into a directory.
    Restore,
    /// Restore a backup and check it against its manifest.
    Verify,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restore => write!(f, "restore"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

//! Workflow events and the sinks that receive them.
//!
//! Every phase call of a workflow run produces a [`WorkflowEvent`]. Events are
//! informational; a sink can never influence the outcome of a run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::errors::ErrorKind;
use crate::pipeline::WorkflowKind;
use crate::stages::{Phase, StageStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An observable step of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The setup pass is about to start.
    WorkflowStarted {
        /// Workflow kind.
        workflow: WorkflowKind,
        /// Server name.
        server: String,
        /// Backup identifier.
        backup_id: String,
        /// Number of stages in the chain.
        stages: usize,
    },
    /// One phase call returned.
    StageCompleted {
        /// Stage name.
        stage: String,
        /// The phase that was called.
        phase: Phase,
        /// Reported status.
        status: StageStatus,
        /// Failure message, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The teardown pass finished.
    WorkflowCompleted {
        /// Workflow kind.
        workflow: WorkflowKind,
        /// Server name.
        server: String,
        /// Backup identifier.
        backup_id: String,
        /// Whether every phase call succeeded.
        success: bool,
        /// Kind of the first failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ErrorKind>,
    },
}

impl WorkflowEvent {
    /// Returns the dotted event type, e.g. `stage.completed`.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::WorkflowCompleted { .. } => "workflow.completed",
        }
    }
}

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the process-wide event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the process-wide event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

//! Workflow builder with validation.

use super::{Workflow, WorkflowKind};
use crate::errors::WorkflowValidationError;
use crate::events::{get_event_sink, EventSink};
use crate::stages::Stage;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Builder for validated workflows.
///
/// Stages run in the order they are added.
pub struct WorkflowBuilder {
    kind: WorkflowKind,
    stages: Vec<Box<dyn Stage>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl WorkflowBuilder {
    /// Creates a builder for a workflow of the given kind.
    #[must_use]
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
            event_sink: None,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(self, stage: impl Stage + 'static) -> Self {
        self.boxed_stage(Box::new(stage))
    }

    /// Appends an already boxed stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the sink receiving workflow events.
    ///
    /// Defaults to the process-wide sink at build time.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stage was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Builds the workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is empty or two stages share a name.
    pub fn build(self) -> Result<Workflow, WorkflowValidationError> {
        if self.stages.is_empty() {
            return Err(WorkflowValidationError::new(format!("{} workflow has no stages", self.kind)));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name().is_empty() {
                return Err(WorkflowValidationError::new("Stage name cannot be empty"));
            }
            if !seen.insert(stage.name()) {
                return Err(
                    WorkflowValidationError::new(format!("Duplicate stage name '{}'", stage.name()))
                        .with_stages(vec![stage.name().to_string()]),
                );
            }
        }

        let sink = self.event_sink.unwrap_or_else(get_event_sink);
        Ok(Workflow::new(self.kind, self.stages, sink))
    }
}

impl fmt::Debug for WorkflowBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("kind", &self.kind)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;

    #[test]
    fn test_build_keeps_order() {
        let workflow = WorkflowBuilder::new(WorkflowKind::Restore)
            .stage(NoOpStage::new("a"))
            .stage(NoOpStage::new("b"))
            .stage(NoOpStage::new("c"))
            .build()
            .unwrap();

        assert_eq!(workflow.kind(), WorkflowKind::Restore);
        assert_eq!(workflow.stage_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_rejected() {
        let err = WorkflowBuilder::new(WorkflowKind::Verify).build().unwrap_err();
        assert!(err.message.contains("no stages"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = WorkflowBuilder::new(WorkflowKind::Verify)
            .stage(NoOpStage::new("a"))
            .stage(NoOpStage::new("a"))
            .build()
            .unwrap_err();
        assert_eq!(err.stages, vec!["a".to_string()]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let builder = WorkflowBuilder::new(WorkflowKind::Verify).stage(NoOpStage::new(""));
        assert_eq!(builder.len(), 1);
        assert!(builder.build().is_err());
    }
}

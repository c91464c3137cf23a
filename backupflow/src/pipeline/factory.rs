//! Workflow factories.

use super::{Workflow, WorkflowBuilder, WorkflowKind};
use crate::config::Configuration;
use crate::errors::BackupflowError;
use crate::events::EventSink;
use crate::stages::{CatalogStage, ChecksumStage, CopyDataStage, RecoveryTargetStage};
use std::fmt;
use std::sync::Arc;

/// Creates the workflow for a maintenance operation.
pub trait WorkflowFactory: Send + Sync {
    /// Builds a fresh workflow of the given kind.
    fn create(&self, kind: WorkflowKind) -> Result<Workflow, BackupflowError>;
}

/// Factory for the standard chains:
///
/// - restore: `catalog`, `copy_data`, `recovery_target`
/// - verify: `catalog`, `copy_data` (scratch copy), `checksum`
pub struct StandardWorkflowFactory {
    config: Arc<Configuration>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl StandardWorkflowFactory {
    /// Creates a factory over the given configuration.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            event_sink: None,
        }
    }

    /// Sets the sink given to every workflow built.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

impl WorkflowFactory for StandardWorkflowFactory {
    fn create(&self, kind: WorkflowKind) -> Result<Workflow, BackupflowError> {
        let copy = CopyDataStage::new(Arc::clone(&self.config));
        let builder = WorkflowBuilder::new(kind).stage(CatalogStage::new(Arc::clone(&self.config)));

        let mut builder = match kind {
            WorkflowKind::Restore => builder.stage(copy).stage(RecoveryTargetStage::new()),
            WorkflowKind::Verify => builder
                .stage(copy.scratch())
                .stage(ChecksumStage::new(Arc::clone(&self.config))),
        };

        if let Some(sink) = &self.event_sink {
            builder = builder.with_event_sink(Arc::clone(sink));
        }

        Ok(builder.build()?)
    }
}

impl fmt::Debug for StandardWorkflowFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardWorkflowFactory")
            .field("base_dir", &self.config.base_dir)
            .finish_non_exhaustive()
    }
}

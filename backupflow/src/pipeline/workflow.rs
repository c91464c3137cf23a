//! The three-pass workflow runner.

use super::WorkflowKind;
use crate::config::ServerConfig;
use crate::context::{keys, ExecutionContext};
use crate::errors::BackupflowError;
use crate::events::{EventSink, WorkflowEvent};
use crate::stages::{Phase, Stage, StageOutput};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// An ordered chain of stages for one maintenance operation.
///
/// A workflow owns its stages and is dropped as a unit once the operation
/// finishes.
pub struct Workflow {
    kind: WorkflowKind,
    stages: Vec<Box<dyn Stage>>,
    event_sink: Arc<dyn EventSink>,
}

impl Workflow {
    pub(crate) fn new(kind: WorkflowKind, stages: Vec<Box<dyn Stage>>, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            kind,
            stages,
            event_sink,
        }
    }

    /// Returns the workflow kind.
    #[must_use]
    pub const fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the workflow against `ctx`.
    ///
    /// Runs `setup` on every stage, then `execute` on every stage if all
    /// setups succeeded, then `teardown` on every stage whose setup succeeded.
    /// The setup and execute passes stop at the first failure. Every teardown
    /// runs even if an earlier one failed.
    ///
    /// When both the setup and execute passes succeed, `completed` is set in
    /// the context before teardown, so stages can tell a finished run from an
    /// aborted one.
    ///
    /// # Errors
    ///
    /// Returns the first failure, as the error matching its phase.
    pub async fn run(
        &self,
        server: &ServerConfig,
        backup_id: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<(), BackupflowError> {
        self.event_sink
            .emit(&WorkflowEvent::WorkflowStarted {
                workflow: self.kind,
                server: server.name.clone(),
                backup_id: backup_id.to_string(),
                stages: self.stages.len(),
            })
            .await;

        let mut first_error: Option<BackupflowError> = None;
        let mut prepared = 0;

        for stage in &self.stages {
            let output = self.call(stage.as_ref(), Phase::Setup, server, backup_id, ctx).await;
            if output.is_failure() {
                first_error = Some(failure(Phase::Setup, stage.as_ref(), &output));
                break;
            }
            prepared += 1;
        }

        if first_error.is_none() {
            for stage in &self.stages {
                let output = self.call(stage.as_ref(), Phase::Execute, server, backup_id, ctx).await;
                if output.is_failure() {
                    first_error = Some(failure(Phase::Execute, stage.as_ref(), &output));
                    break;
                }
            }
        }

        if first_error.is_none() {
            if let Err(e) = ctx.insert(keys::COMPLETED, true) {
                first_error = Some(e.into());
            }
        }

        for stage in &self.stages[..prepared] {
            let output = self.call(stage.as_ref(), Phase::Teardown, server, backup_id, ctx).await;
            if output.is_failure() {
                let error = failure(Phase::Teardown, stage.as_ref(), &output);
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    warn!(workflow = %self.kind, error = %error, "Teardown failed after an earlier failure");
                }
            }
        }

        self.event_sink
            .emit(&WorkflowEvent::WorkflowCompleted {
                workflow: self.kind,
                server: server.name.clone(),
                backup_id: backup_id.to_string(),
                success: first_error.is_none(),
                error_kind: first_error.as_ref().map(BackupflowError::kind),
            })
            .await;

        first_error.map_or(Ok(()), Err)
    }

    async fn call(
        &self,
        stage: &dyn Stage,
        phase: Phase,
        server: &ServerConfig,
        backup_id: &str,
        ctx: &mut ExecutionContext,
    ) -> StageOutput {
        let output = stage.call(phase, server, backup_id, ctx).await;
        debug!(
            workflow = %self.kind,
            stage = stage.name(),
            phase = %phase,
            status = %output.status,
            "Stage phase completed"
        );
        self.event_sink
            .emit(&WorkflowEvent::StageCompleted {
                stage: stage.name().to_string(),
                phase,
                status: output.status,
                error: output.error.clone(),
            })
            .await;
        output
    }
}

fn failure(phase: Phase, stage: &dyn Stage, output: &StageOutput) -> BackupflowError {
    BackupflowError::stage_failure(phase, stage.name(), output.error_message())
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("kind", &self.kind)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::events::CollectingEventSink;
    use crate::pipeline::WorkflowBuilder;
    use crate::testing::{call_log, RecordingStage};
    use pretty_assertions::assert_eq;

    fn build(stages: Vec<RecordingStage>, sink: Arc<CollectingEventSink>) -> Workflow {
        stages
            .into_iter()
            .fold(WorkflowBuilder::new(WorkflowKind::Restore), WorkflowBuilder::stage)
            .with_event_sink(sink)
            .build()
            .unwrap()
    }

    async fn run(workflow: &Workflow) -> Result<(), BackupflowError> {
        let mut ctx = ExecutionContext::new(true);
        workflow.run(&ServerConfig::new("pg"), "b1", &mut ctx).await
    }

    #[tokio::test]
    async fn test_three_passes_in_order() {
        let log = call_log();
        let sink = Arc::new(CollectingEventSink::new());
        let workflow = build(
            vec![RecordingStage::new("a", &log), RecordingStage::new("b", &log)],
            Arc::clone(&sink),
        );

        run(&workflow).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:setup", "b:setup", "a:execute", "b:execute", "a:teardown", "b:teardown"]
        );
        assert_eq!(sink.events_of_type("stage.").len(), 6);
        assert_eq!(sink.events_of_type("workflow.").len(), 2);
    }

    #[tokio::test]
    async fn test_completed_marker_only_after_full_run() {
        let log = call_log();
        let server = ServerConfig::new("pg");

        let workflow = build(vec![RecordingStage::new("a", &log)], Arc::new(CollectingEventSink::new()));
        let mut ctx = ExecutionContext::new(true);
        workflow.run(&server, "b1", &mut ctx).await.unwrap();
        assert!(ctx.get_bool(keys::COMPLETED).unwrap());

        let workflow = build(
            vec![RecordingStage::new("b", &log).failing_at(Phase::Execute)],
            Arc::new(CollectingEventSink::new()),
        );
        let mut ctx = ExecutionContext::new(true);
        assert!(workflow.run(&server, "b1", &mut ctx).await.is_err());
        assert!(!ctx.contains_key(keys::COMPLETED));
    }

    #[tokio::test]
    async fn test_setup_failure_stops_setup_pass() {
        let log = call_log();
        let sink = Arc::new(CollectingEventSink::new());
        let workflow = build(
            vec![
                RecordingStage::new("a", &log),
                RecordingStage::new("b", &log).failing_at(Phase::Setup),
                RecordingStage::new("c", &log),
            ],
            Arc::clone(&sink),
        );

        let err = run(&workflow).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StageSetupFailure);
        assert_eq!(*log.lock(), vec!["a:setup", "b:setup", "a:teardown"]);
    }

    #[tokio::test]
    async fn test_execute_failure_still_tears_down() {
        let log = call_log();
        let workflow = build(
            vec![
                RecordingStage::new("a", &log).failing_at(Phase::Execute),
                RecordingStage::new("b", &log),
            ],
            Arc::new(CollectingEventSink::new()),
        );

        let err = run(&workflow).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StageExecuteFailure);
        assert_eq!(
            *log.lock(),
            vec!["a:setup", "b:setup", "a:execute", "a:teardown", "b:teardown"]
        );
    }

    #[tokio::test]
    async fn test_teardown_failure_runs_remaining_teardowns() {
        let log = call_log();
        let sink = Arc::new(CollectingEventSink::new());
        let workflow = build(
            vec![
                RecordingStage::new("a", &log).failing_at(Phase::Teardown),
                RecordingStage::new("b", &log),
            ],
            Arc::clone(&sink),
        );

        let err = run(&workflow).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StageTeardownFailure);
        assert!(log.lock().ends_with(&["a:teardown".to_string(), "b:teardown".to_string()]));

        let completed = sink.events_of_type("workflow.completed");
        assert_eq!(
            completed[0],
            WorkflowEvent::WorkflowCompleted {
                workflow: WorkflowKind::Restore,
                server: "pg".to_string(),
                backup_id: "b1".to_string(),
                success: false,
                error_kind: Some(ErrorKind::StageTeardownFailure),
            }
        );
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let log = call_log();
        let workflow = build(
            vec![
                RecordingStage::new("a", &log).failing_at(Phase::Execute),
                RecordingStage::new("b", &log).failing_at(Phase::Teardown),
            ],
            Arc::new(CollectingEventSink::new()),
        );

        let err = run(&workflow).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StageExecuteFailure);
        assert!(err.to_string().contains("'a'"));
    }
}

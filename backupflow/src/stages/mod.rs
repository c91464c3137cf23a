//! Stage trait and the built-in maintenance stages.
//!
//! A stage is one element of a workflow. The workflow calls `setup` on every
//! stage, then `execute` on every stage, then `teardown`, always in chain
//! order and always with the same execution context. Stages never own the
//! context; they read their inputs from it and publish their results into it.

mod catalog;
mod checksum;
mod copy;
mod output;
mod recovery;

pub use catalog::CatalogStage;
pub use checksum::ChecksumStage;
pub use copy::{CopyDataStage, RESTORE_LAST_FILES};
pub use output::{Phase, StageOutput, StageStatus};
pub use recovery::{PositionError, RecoveryAction, RecoverySettings, RecoveryTarget, RecoveryTargetStage};

use crate::config::ServerConfig;
use crate::context::ExecutionContext;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for workflow stages.
///
/// `setup` and `teardown` default to a successful no-op.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage, unique within a workflow.
    fn name(&self) -> &str;

    /// Prepares the stage.
    async fn setup(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        StageOutput::ok()
    }

    /// Performs the stage's work.
    async fn execute(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput;

    /// Releases whatever `setup` acquired.
    async fn teardown(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        StageOutput::ok()
    }

    /// Dispatches to the method for `phase`.
    async fn call(
        &self,
        phase: Phase,
        server: &ServerConfig,
        backup_id: &str,
        ctx: &mut ExecutionContext,
    ) -> StageOutput {
        match phase {
            Phase::Setup => self.setup(server, backup_id, ctx).await,
            Phase::Execute => self.execute(server, backup_id, ctx).await,
            Phase::Teardown => self.teardown(server, backup_id, ctx).await,
        }
    }
}

#[async_trait]
impl<S: Stage + ?Sized> Stage for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn setup(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        (**self).setup(server, backup_id, ctx).await
    }

    async fn execute(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        (**self).execute(server, backup_id, ctx).await
    }

    async fn teardown(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        (**self).teardown(server, backup_id, ctx).await
    }
}

/// A stage that does nothing in any phase.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _server: &ServerConfig, _backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        StageOutput::ok()
    }
}

/// Reads a required string input, turning its absence into a stage failure.
fn required_str(ctx: &ExecutionContext, key: &str) -> Result<String, StageOutput> {
    ctx.get_str(key)
        .map(str::to_string)
        .map_err(|e| StageOutput::fail(e.to_string()))
}

/// Publishes a string result, failing if another stage already did.
fn publish_str(ctx: &mut ExecutionContext, key: &str, value: impl Into<String>) -> StageOutput {
    match ctx.insert(key, value.into()) {
        Ok(()) => StageOutput::ok(),
        Err(e) => StageOutput::fail(e.to_string()),
    }
}

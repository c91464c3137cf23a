//! Restore and verify orchestration.
//!
//! An orchestrator builds a fresh execution context from the request, runs the
//! matching workflow, copies the results out of the context and reports to
//! the client. Context and workflow are scoped to the call and dropped on
//! every path.
//!
//! [`MaintenanceService`] is the client-facing entrypoint: it times the
//! operation, logs it, writes the [`ResultEnvelope`] and disconnects the
//! client. Each call can run in its own task via `spawn_restore` and
//! `spawn_verify`.

mod restore;
mod verify;


pub use restore::{restore_backup, RestoreOutcome, RestoreRequest};
pub use verify::{verify_backup, VerifyRequest};

use crate::config::Configuration;
use crate::context::ExecutionContext;
use crate::errors::BackupflowError;
use crate::management::{ClientConnection, ResultEnvelope};
use crate::pipeline::{StandardWorkflowFactory, WorkflowFactory, WorkflowKind};
use crate::utils::{elapsed_between, generate_operation_id, now_utc, Timestamp};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Runs maintenance operations for clients.
#[derive(Clone)]
pub struct MaintenanceService {
    config: Arc<Configuration>,
    factory: Arc<dyn WorkflowFactory>,
}

impl MaintenanceService {
    /// Creates a service using the standard workflows.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        let factory = Arc::new(StandardWorkflowFactory::new(Arc::clone(&config)));
        Self::with_factory(config, factory)
    }

    /// Creates a service using a custom workflow factory.
    #[must_use]
    pub fn with_factory(config: Arc<Configuration>, factory: Arc<dyn WorkflowFactory>) -> Self {
        Self { config, factory }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    fn server_name(&self, index: usize) -> String {
        self.config
            .server(index)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    /// Writes the result envelope and disconnects, logging delivery problems.
    async fn report<C>(&self, client: &mut C, operation: WorkflowKind, server: String, success: bool, start: Timestamp)
    where
        C: ClientConnection + ?Sized,
    {
        let end = now_utc();
        let envelope = ResultEnvelope {
            operation,
            server,
            success,
            operation_id: generate_operation_id(),
            time: end,
            elapsed: elapsed_between(start, end),
        };

        if let Err(e) = client.write_result(&envelope).await {
            warn!(operation = %operation, error = %e, "Cannot write result to client");
        }
        if let Err(e) = client.disconnect().await {
            warn!(operation = %operation, error = %e, "Cannot disconnect client");
        }
    }
}

impl fmt::Debug for MaintenanceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaintenanceService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Copies a required string result out of a finished context.
fn copy_result(ctx: &ExecutionContext, key: &str) -> Result<String, BackupflowError> {
    ctx.get_str(key).map(str::to_string).map_err(|source| {
        if source.is_missing() {
            BackupflowError::MissingResult { key: key.to_string() }
        } else {
            BackupflowError::ResultCopy {
                key: key.to_string(),
                source,
            }
        }
    })
}

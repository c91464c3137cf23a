//! Restore orchestration.

use super::{copy_result, MaintenanceService};
use crate::config::Configuration;
use crate::context::{keys, ExecutionContext};
use crate::errors::BackupflowError;
use crate::management::ClientConnection;
use crate::pipeline::{WorkflowFactory, WorkflowKind};
use crate::utils::{elapsed_between, now_utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

/// A restore request. All inputs are owned copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Index of the server in the configuration.
    pub server: usize,
    /// Backup to restore.
    pub backup_id: String,
    /// Recovery target expression; empty for a full restore.
    pub position: String,
    /// Destination directory.
    pub directory: String,
}

impl RestoreRequest {
    /// Creates a request, copying every input.
    #[must_use]
    pub fn new(server: usize, backup_id: &str, position: &str, directory: &str) -> Self {
        Self {
            server,
            backup_id: backup_id.to_string(),
            position: position.to_string(),
            directory: directory.to_string(),
        }
    }
}

/// The results of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Where the backup was restored to.
    pub output: String,
    /// Identifier of the restored backup.
    pub identifier: String,
}

/// Restores a backup through a freshly created restore workflow.
///
/// # Errors
///
/// Returns the first failure: unknown server, context assembly, any stage
/// phase, or a missing or malformed result.
pub async fn restore_backup(
    config: &Configuration,
    factory: &dyn WorkflowFactory,
    request: &RestoreRequest,
) -> Result<RestoreOutcome, BackupflowError> {
    let server = config
        .server(request.server)
        .ok_or(BackupflowError::UnknownServer(request.server))?;

    let mut ctx = ExecutionContext::new(false);
    ctx.insert(keys::POSITION, request.position.as_str())?;
    ctx.insert(keys::DIRECTORY, request.directory.as_str())?;

    let workflow = factory.create(WorkflowKind::Restore)?;
    workflow.run(server, &request.backup_id, &mut ctx).await?;

    let output = copy_result(&ctx, keys::OUTPUT)?;
    let identifier = copy_result(&ctx, keys::IDENTIFIER)?;
    ctx.list();

    Ok(RestoreOutcome { output, identifier })
}

impl MaintenanceService {
    /// Runs a restore for a client and reports the outcome to it.
    ///
    /// Returns whether the restore succeeded. The client is always sent a
    /// result envelope and disconnected.
    pub async fn restore<C>(&self, client: &mut C, request: RestoreRequest) -> bool
    where
        C: ClientConnection + ?Sized,
    {
        let server = self.server_name(request.server);
        let span = info_span!("restore", server = %server, backup = %request.backup_id);

        async {
            let start = now_utc();
            let result = restore_backup(&self.config, self.factory.as_ref(), &request).await;
            let success = match result {
                Ok(outcome) => {
                    info!(
                        "Restore: {}/{} (Elapsed: {})",
                        server,
                        outcome.identifier,
                        elapsed_between(start, now_utc())
                    );
                    true
                }
                Err(e) => {
                    debug!(kind = ?e.kind(), error = %e, "Restore failed");
                    false
                }
            };

            self.report(client, WorkflowKind::Restore, server.clone(), success, start)
                .await;
            success
        }
        .instrument(span)
        .await
    }

    /// Runs [`MaintenanceService::restore`] in its own task.
    pub fn spawn_restore<C>(self: &Arc<Self>, mut client: C, request: RestoreRequest) -> JoinHandle<bool>
    where
        C: ClientConnection + 'static,
    {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.restore(&mut client, request).await })
    }
}

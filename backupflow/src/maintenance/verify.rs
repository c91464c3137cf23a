//! Verify orchestration.

use super::{copy_result, MaintenanceService};
use crate::config::Configuration;
use crate::context::{keys, ExecutionContext};
use crate::errors::BackupflowError;
use crate::management::ClientConnection;
use crate::pipeline::{WorkflowFactory, WorkflowKind};
use crate::utils::{elapsed_between, now_utc};
use crate::verify::VerifyReport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// A verify request. All inputs are owned copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Index of the server in the configuration.
    pub server: usize,
    /// Backup to verify.
    pub backup_id: String,
    /// Directory the backup is restored into for checking.
    pub directory: String,
    /// File filter expression; empty for all files.
    pub files: String,
}

impl VerifyRequest {
    /// Creates a request, copying every input.
    #[must_use]
    pub fn new(server: usize, backup_id: &str, directory: &str, files: &str) -> Self {
        Self {
            server,
            backup_id: backup_id.to_string(),
            directory: directory.to_string(),
            files: files.to_string(),
        }
    }
}

/// Verifies a backup through a freshly created verify workflow.
///
/// On success `output` and `identifier` are appended to the caller's buffers
/// and the per-file report is returned. Mismatching files do not make the
/// call fail. On failure the buffers are left untouched.
///
/// # Errors
///
/// Returns the first failure: unknown server, context assembly, any stage
/// phase, or a missing or malformed result.
pub async fn verify_backup(
    config: &Configuration,
    factory: &dyn WorkflowFactory,
    request: &VerifyRequest,
    output: &mut String,
    identifier: &mut String,
) -> Result<VerifyReport, BackupflowError> {
    let server = config
        .server(request.server)
        .ok_or(BackupflowError::UnknownServer(request.server))?;

    let mut ctx = ExecutionContext::new(false);
    ctx.insert(keys::POSITION, "")?;
    ctx.insert(keys::DIRECTORY, request.directory.as_str())?;
    ctx.insert(keys::FILES, request.files.as_str())?;

    let workflow = factory.create(WorkflowKind::Verify)?;
    workflow.run(server, &request.backup_id, &mut ctx).await?;

    let result_output = copy_result(&ctx, keys::OUTPUT)?;
    let result_identifier = copy_result(&ctx, keys::IDENTIFIER)?;
    ctx.list();
    let report = VerifyReport::from_context(&ctx)?;

    output.push_str(&result_output);
    identifier.push_str(&result_identifier);
    Ok(report)
}

impl MaintenanceService {
    /// Runs a verify for a client and reports the outcome to it.
    ///
    /// On success the per-file report is written before the result envelope.
    /// Returns whether the check ran to completion.
    pub async fn verify<C>(&self, client: &mut C, request: VerifyRequest) -> bool
    where
        C: ClientConnection + ?Sized,
    {
        let server = self.server_name(request.server);
        let span = info_span!("verify", server = %server, backup = %request.backup_id);

        async {
            let start = now_utc();
            let mut output = String::new();
            let mut identifier = String::new();
            let result = verify_backup(&self.config, self.factory.as_ref(), &request, &mut output, &mut identifier).await;

            let success = match result {
                Ok(report) => {
                    info!(
                        "Verify: {}/{} (Elapsed: {})",
                        server,
                        identifier,
                        elapsed_between(start, now_utc())
                    );
                    if let Err(e) = client.write_verify(&report).await {
                        warn!(error = %e, "Cannot write verify report to client");
                    }
                    true
                }
                Err(e) => {
                    debug!(kind = ?e.kind(), error = %e, "Verify failed");
                    false
                }
            };

            self.report(client, WorkflowKind::Verify, server.clone(), success, start)
                .await;
            success
        }
        .instrument(span)
        .await
    }

    /// Runs [`MaintenanceService::verify`] in its own task.
    pub fn spawn_verify<C>(self: &Arc<Self>, mut client: C, request: VerifyRequest) -> JoinHandle<bool>
    where
        C: ClientConnection + 'static,
    {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.verify(&mut client, request).await })
    }
}

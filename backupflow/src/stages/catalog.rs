//! Locates a backup on disk and publishes its identifier.

use super::{publish_str, Stage, StageOutput};
use crate::config::{Configuration, ServerConfig};
use crate::context::{keys, ExecutionContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Checks that `<base_dir>/<server>/backup/<id>/data` exists during setup and
/// publishes the backup id under `identifier` during execute.
#[derive(Debug, Clone)]
pub struct CatalogStage {
    config: Arc<Configuration>,
}

impl CatalogStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for CatalogStage {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn setup(&self, server: &ServerConfig, backup_id: &str, _ctx: &mut ExecutionContext) -> StageOutput {
        if backup_id.is_empty() || backup_id.contains(['/', '\\']) || backup_id == ".." {
            return StageOutput::fail(format!("invalid backup identifier '{backup_id}'"));
        }

        let data_dir = self.config.backup_data_dir(server, backup_id);
        match tokio::fs::metadata(&data_dir).await {
            Ok(meta) if meta.is_dir() => {
                debug!(server = %server.name, backup = %backup_id, path = %data_dir.display(), "Backup located");
                StageOutput::ok()
            }
            Ok(_) => StageOutput::fail(format!("{} is not a directory", data_dir.display())),
            Err(e) => StageOutput::fail(format!("backup {}/{backup_id} not found: {e}", server.name)),
        }
    }

    async fn execute(&self, _server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        publish_str(ctx, keys::IDENTIFIER, backup_id)
    }
}

//! Copies a backup's data directory to the requested destination.

use super::{publish_str, required_str, Stage, StageOutput};
use crate::config::{Configuration, ServerConfig};
use crate::context::{keys, ContextValue, ExecutionContext};
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Files copied after everything else, relative to the data directory.
///
/// The control file goes last so an interrupted copy never looks like a
/// complete cluster.
pub const RESTORE_LAST_FILES: &[&str] = &["global/pg_control"];

/// What a tree copy did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CopyReport {
    /// Relative paths in the order they were copied.
    pub copied: Vec<PathBuf>,
    /// Total bytes written.
    pub bytes: u64,
    /// Entries that are neither regular files nor directories, left out.
    pub skipped: Vec<PathBuf>,
}

/// Copies `<backup>/data` into `<directory>/<server>-<id>` and publishes the
/// target path under `output`.
///
/// The target is recorded under `copied` before copying starts. Teardown
/// removes it when the run did not complete, and always for a scratch copy.
#[derive(Debug, Clone)]
pub struct CopyDataStage {
    config: Arc<Configuration>,
    scratch: bool,
}

impl CopyDataStage {
    /// Creates a stage whose copy is kept after a completed run.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config, scratch: false }
    }

    /// Removes the copy in teardown even after a completed run.
    #[must_use]
    pub fn scratch(mut self) -> Self {
        self.scratch = true;
        self
    }

    /// Returns the directory a backup is restored into.
    #[must_use]
    pub fn target_dir(directory: &Path, server: &ServerConfig, backup_id: &str) -> PathBuf {
        directory.join(format!("{}-{backup_id}", server.name))
    }
}

#[async_trait]
impl Stage for CopyDataStage {
    fn name(&self) -> &str {
        "copy_data"
    }

    async fn setup(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let directory = match required_str(ctx, keys::DIRECTORY) {
            Ok(d) => d,
            Err(output) => return output,
        };
        if directory.is_empty() {
            return StageOutput::fail("no destination directory given");
        }

        let target = Self::target_dir(Path::new(&directory), server, backup_id);
        match tokio::fs::try_exists(&target).await {
            Ok(false) => StageOutput::ok(),
            Ok(true) => StageOutput::fail(format!("{} already exists", target.display())),
            Err(e) => StageOutput::fail(format!("cannot inspect {}: {e}", target.display())),
        }
    }

    async fn execute(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let directory = match required_str(ctx, keys::DIRECTORY) {
            Ok(d) => d,
            Err(output) => return output,
        };
        let source = self.config.backup_data_dir(server, backup_id);
        let target = Self::target_dir(Path::new(&directory), server, backup_id);
        if let Err(e) = ctx.insert(keys::COPIED, target.to_string_lossy().to_string()) {
            return StageOutput::fail(e.to_string());
        }

        let copy_target = target.clone();
        let report = match tokio::task::spawn_blocking(move || copy_tree(&source, &copy_target)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => return StageOutput::fail(format!("copy to {} failed: {e}", target.display())),
            Err(e) => return StageOutput::fail(format!("copy task failed: {e}")),
        };

        for skipped in &report.skipped {
            warn!(server = %server.name, backup = %backup_id, entry = %skipped.display(), "Not a file or directory, skipped");
        }
        info!(
            server = %server.name,
            backup = %backup_id,
            files = report.copied.len(),
            bytes = report.bytes,
            "Copied backup data to {}",
            target.display()
        );

        publish_str(ctx, keys::OUTPUT, target.to_string_lossy())
            .with_metadata("files", serde_json::json!(report.copied.len()))
            .with_metadata("bytes", serde_json::json!(report.bytes))
    }

    async fn teardown(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let Some(copied) = ctx.get(keys::COPIED).and_then(ContextValue::as_str) else {
            return StageOutput::ok();
        };
        let completed = ctx.get_bool(keys::COMPLETED).unwrap_or(false);
        if completed && !self.scratch {
            return StageOutput::ok();
        }

        match tokio::fs::remove_dir_all(copied).await {
            Ok(()) => {
                debug!(server = %server.name, backup = %backup_id, target = %copied, completed, "Removed copy");
                StageOutput::ok()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => StageOutput::ok(),
            Err(e) => StageOutput::fail(format!("cannot remove {copied}: {e}")),
        }
    }
}

/// Copies every file under `source` into `target`, recreating the directory
/// structure and deferring [`RESTORE_LAST_FILES`] to the end.
pub(crate) fn copy_tree(source: &Path, target: &Path) -> io::Result<CopyReport> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut skipped = Vec::new();
    collect(source, Path::new(""), &mut dirs, &mut files, &mut skipped)?;
    files.sort();

    fs::create_dir_all(target)?;
    for dir in &dirs {
        fs::create_dir_all(target.join(dir))?;
    }

    let (last, first): (Vec<PathBuf>, Vec<PathBuf>) = files.into_iter().partition(|rel| is_restore_last(rel));

    let mut report = CopyReport {
        skipped,
        ..CopyReport::default()
    };
    for rel in first.into_iter().chain(last) {
        debug!(file = %rel.display(), "Copying");
        report.bytes += fs::copy(source.join(&rel), target.join(&rel))?;
        report.copied.push(rel);
    }
    Ok(report)
}

fn collect(
    root: &Path,
    rel: &Path,
    dirs: &mut Vec<PathBuf>,
    files: &mut Vec<PathBuf>,
    skipped: &mut Vec<PathBuf>,
) -> io::Result<()> {
    for entry in fs::read_dir(root.join(rel))? {
        let entry = entry?;
        let path = rel.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            dirs.push(path.clone());
            collect(root, &path, dirs, files, skipped)?;
        } else if file_type.is_file() {
            files.push(path);
        } else {
            skipped.push(path);
        }
    }
    Ok(())
}

fn is_restore_last(rel: &Path) -> bool {
    RESTORE_LAST_FILES.iter().any(|last| rel == Path::new(last))
}

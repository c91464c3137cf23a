//! Verifies restored files against the backup manifest.

use super::{required_str, Stage, StageOutput};
use crate::config::{Configuration, ServerConfig};
use crate::context::{keys, ContextValue, ExecutionContext};
use crate::verify::{record_entry, HashAlgorithm, Manifest, VerifyEntry};
use async_trait::async_trait;
use regex::Regex;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Hashes every manifest file in the restored copy and records one
/// [`VerifyEntry`] per file.
///
/// Setup loads the manifest into the context and creates the empty `failed`
/// and `all` lists. Execute reads `output` and the `files` filter, an
/// unanchored regular expression matched against the relative file path. An
/// empty filter selects every file.
#[derive(Debug, Clone)]
pub struct ChecksumStage {
    config: Arc<Configuration>,
}

impl ChecksumStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for ChecksumStage {
    fn name(&self) -> &str {
        "checksum"
    }

    async fn setup(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let filter = match required_str(ctx, keys::FILES) {
            Ok(f) => f,
            Err(output) => return output,
        };
        if let Err(e) = file_filter(&filter) {
            return StageOutput::fail(format!("invalid file filter '{filter}': {e}"));
        }

        let path = self.config.manifest_path(server, backup_id);
        let manifest = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match Manifest::parse(&content) {
                Ok(m) => m,
                Err(e) => return StageOutput::fail(format!("{}: {e}", path.display())),
            },
            Err(e) => return StageOutput::fail(format!("cannot read {}: {e}", path.display())),
        };

        let inserted = manifest.to_context().and_then(|map| {
            ctx.insert(keys::MANIFEST, map)?;
            ctx.insert(keys::FAILED, Vec::<ContextValue>::new())?;
            ctx.insert(keys::ALL, Vec::<ContextValue>::new())
        });
        inserted.into()
    }

    async fn execute(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let (root, filter) = match (required_str(ctx, keys::OUTPUT), required_str(ctx, keys::FILES)) {
            (Ok(root), Ok(filter)) => (root, filter),
            (Err(output), _) | (_, Err(output)) => return output,
        };
        let filter = match file_filter(&filter) {
            Ok(f) => f,
            Err(e) => return StageOutput::fail(e.to_string()),
        };
        let manifest = match ctx.get_map(keys::MANIFEST).and_then(Manifest::from_context) {
            Ok(m) => m,
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let selected: Vec<(String, String)> = manifest
            .iter()
            .filter(|(path, _)| filter.as_ref().map_or(true, |re| re.is_match(path)))
            .map(|(path, hash)| (path.to_string(), hash.to_string()))
            .collect();
        let algorithm = self.config.hash_algorithm_for(server);

        let hash_root = root.clone();
        let entries = match tokio::task::spawn_blocking(move || hash_files(&hash_root, &selected, algorithm)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => return StageOutput::fail(format!("hashing files in {root} failed: {e}")),
            Err(e) => return StageOutput::fail(format!("hash task failed: {e}")),
        };

        let mut failed = 0_usize;
        for entry in &entries {
            match record_entry(ctx, entry) {
                Ok(true) => {}
                Ok(false) => {
                    failed += 1;
                    warn!(server = %server.name, backup = %backup_id, file = %entry.filename, "Checksum mismatch");
                }
                Err(e) => return StageOutput::fail(e.to_string()),
            }
        }

        info!(
            server = %server.name,
            backup = %backup_id,
            algorithm = %algorithm,
            checked = entries.len(),
            failed,
            "Verified backup files"
        );
        StageOutput::ok()
            .with_metadata("checked", serde_json::json!(entries.len()))
            .with_metadata("failed", serde_json::json!(failed))
    }
}

fn file_filter(expression: &str) -> Result<Option<Regex>, regex::Error> {
    if expression.is_empty() {
        Ok(None)
    } else {
        Regex::new(expression).map(Some)
    }
}

/// Hashes each selected file. A file that cannot be read is reported with an
/// empty calculated hash; only an unreadable restore root fails the call.
fn hash_files(root: &str, selected: &[(String, String)], algorithm: HashAlgorithm) -> io::Result<Vec<VerifyEntry>> {
    let base = Path::new(root);
    if !std::fs::metadata(base)?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a directory"));
    }

    let entries = selected
        .iter()
        .map(|(path, original)| {
            let calculated = algorithm.hash_file(&base.join(path)).unwrap_or_else(|e| {
                warn!(file = %path, error = %e, "Cannot hash file");
                String::new()
            });
            VerifyEntry::new(root, path.as_str(), original.as_str(), calculated, algorithm)
        })
        .collect();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BackupFixture;
    use crate::verify::VerifyReport;

    fn prepared(fixture: &BackupFixture, filter: &str) -> (Arc<Configuration>, ExecutionContext) {
        let config = fixture.write().unwrap();
        let restored = fixture.restore_dir().join("copy");
        crate::stages::copy::copy_tree(&config.backup_data_dir(config.server(0).unwrap(), fixture.backup_id()), &restored)
            .unwrap();

        let mut ctx = ExecutionContext::new(true);
        ctx.insert(keys::FILES, filter).unwrap();
        ctx.insert(keys::OUTPUT, restored.to_string_lossy().to_string()).unwrap();
        (config, ctx)
    }

    #[tokio::test]
    async fn test_checksum_records_mismatches() {
        let fixture = BackupFixture::new("pg", "b1")
            .with_file("base/1/100", b"one")
            .with_file("base/1/200", b"two")
            .with_mismatch("global/pg_control", b"ctl");
        let (config, mut ctx) = prepared(&fixture, "");
        let server = config.server(0).unwrap();
        let stage = ChecksumStage::new(Arc::clone(&config));

        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        let output = stage.execute(server, "b1", &mut ctx).await;
        assert!(output.is_success(), "{output:?}");
        assert_eq!(output.metadata["failed"], 1);

        let report = VerifyReport::from_context(&ctx).unwrap();
        assert_eq!(report.all.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "global/pg_control");
        assert_eq!(report.all[0].hash_algorithm, HashAlgorithm::Sha256);
    }

    #[tokio::test]
    async fn test_checksum_filter() {
        let fixture = BackupFixture::new("pg", "b1")
            .with_file("base/1/100", b"one")
            .with_file("base/2/100", b"two")
            .with_file("global/pg_control", b"ctl");
        let (config, mut ctx) = prepared(&fixture, "^base/");
        let server = config.server(0).unwrap();
        let stage = ChecksumStage::new(Arc::clone(&config));

        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        assert!(stage.execute(server, "b1", &mut ctx).await.is_success());

        let report = VerifyReport::from_context(&ctx).unwrap();
        let names: Vec<_> = report.all.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["base/1/100", "base/2/100"]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_checksum_missing_file_is_mismatch() {
        let fixture = BackupFixture::new("pg", "b1").with_file("base/1/100", b"one");
        let (config, mut ctx) = prepared(&fixture, "");
        let server = config.server(0).unwrap();
        std::fs::remove_file(fixture.restore_dir().join("copy/base/1/100")).unwrap();

        let stage = ChecksumStage::new(Arc::clone(&config));
        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        assert!(stage.execute(server, "b1", &mut ctx).await.is_success());

        let report = VerifyReport::from_context(&ctx).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].calculated, "");
    }

    #[tokio::test]
    async fn test_checksum_unreadable_entry_is_mismatch() {
        let fixture = BackupFixture::new("pg", "b1")
            .with_file("base/1/100", b"one")
            .with_file("base/9/1", b"nine")
            .with_file("base/1/200", b"two");
        let (config, mut ctx) = prepared(&fixture, "");
        let server = config.server(0).unwrap();
        let manifest = config.manifest_path(server, "b1");
        let mut content = std::fs::read_to_string(&manifest).unwrap();
        content.push_str("base/9,deadbeef\n");
        std::fs::write(&manifest, content).unwrap();

        let stage = ChecksumStage::new(Arc::clone(&config));
        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        let output = stage.execute(server, "b1", &mut ctx).await;
        assert!(output.is_success(), "{output:?}");

        let report = VerifyReport::from_context(&ctx).unwrap();
        assert_eq!(report.all.len(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "base/9");
        assert_eq!(report.failed[0].calculated, "");
    }

    #[tokio::test]
    async fn test_checksum_missing_restore_root_fails() {
        let fixture = BackupFixture::new("pg", "b1").with_file("a", b"a");
        let (config, mut ctx) = prepared(&fixture, "");
        let server = config.server(0).unwrap();
        std::fs::remove_dir_all(fixture.restore_dir().join("copy")).unwrap();

        let stage = ChecksumStage::new(Arc::clone(&config));
        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        assert!(stage.execute(server, "b1", &mut ctx).await.is_failure());
    }

    #[tokio::test]
    async fn test_checksum_invalid_filter() {
        let fixture = BackupFixture::new("pg", "b1").with_file("a", b"a");
        let (config, mut ctx) = prepared(&fixture, "([");
        let server = config.server(0).unwrap();

        let output = ChecksumStage::new(Arc::clone(&config)).setup(server, "b1", &mut ctx).await;
        assert!(output.is_failure());
        assert!(!ctx.contains_key(keys::ALL));
    }

    #[tokio::test]
    async fn test_checksum_crc32_server() {
        let fixture = BackupFixture::new("pg", "b1")
            .with_algorithm(HashAlgorithm::Crc32)
            .with_file("a", b"123456789");
        let (config, mut ctx) = prepared(&fixture, "");
        let server = config.server(0).unwrap();
        let stage = ChecksumStage::new(Arc::clone(&config));

        assert!(stage.setup(server, "b1", &mut ctx).await.is_success());
        assert!(stage.execute(server, "b1", &mut ctx).await.is_success());

        let report = VerifyReport::from_context(&ctx).unwrap();
        assert_eq!(report.all[0].calculated, "cbf43926");
        assert!(report.is_clean());
    }
}

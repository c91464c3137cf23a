//! On-disk backup fixtures.

use crate::config::{Configuration, ServerConfig};
use crate::verify::{HashAlgorithm, MANIFEST_HEADER};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug)]
struct FixtureFile {
    path: String,
    content: Vec<u8>,
    mismatch: bool,
}

/// A backup laid out under a temporary directory:
/// `<root>/backups/<server>/backup/<id>/{data/, backup.manifest}` plus an
/// empty `<root>/restore` destination.
#[derive(Debug)]
pub struct BackupFixture {
    root: TempDir,
    server: String,
    backup_id: String,
    algorithm: HashAlgorithm,
    files: Vec<FixtureFile>,
}

impl BackupFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new(server: &str, backup_id: &str) -> Self {
        let root = tempfile::tempdir().expect("create temporary directory");
        fs::create_dir_all(root.path().join("restore")).expect("create restore directory");
        Self {
            root,
            server: server.to_string(),
            backup_id: backup_id.to_string(),
            algorithm: HashAlgorithm::default(),
            files: Vec::new(),
        }
    }

    /// Adds a file whose manifest hash matches its content.
    #[must_use]
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push(FixtureFile {
            path: path.to_string(),
            content: content.to_vec(),
            mismatch: false,
        });
        self
    }

    /// Adds a file whose manifest hash does not match its content.
    #[must_use]
    pub fn with_mismatch(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push(FixtureFile {
            path: path.to_string(),
            content: content.to_vec(),
            mismatch: true,
        });
        self
    }

    /// Sets the server's manifest hash algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Returns the backup id.
    #[must_use]
    pub fn backup_id(&self) -> &str {
        &self.backup_id
    }

    /// Returns the configured base directory.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.root.path().join("backups")
    }

    /// Returns the empty destination directory.
    #[must_use]
    pub fn restore_dir(&self) -> PathBuf {
        self.root.path().join("restore")
    }

    /// Writes the backup and its manifest, returning a configuration with
    /// the fixture's server at index 0.
    pub fn write(&self) -> io::Result<Arc<Configuration>> {
        let config = Configuration::new(self.base_dir())
            .with_server(ServerConfig::new(&self.server).with_hash_algorithm(self.algorithm));
        let server = &config.servers[0];
        let data_dir = config.backup_data_dir(server, &self.backup_id);
        fs::create_dir_all(&data_dir)?;

        let mut manifest = format!("{MANIFEST_HEADER}\n");
        for file in &self.files {
            write_file(&data_dir, &file.path, &file.content)?;
            let recorded = if file.mismatch {
                let mut altered = file.content.clone();
                altered.push(b'!');
                self.algorithm.hash_bytes(&altered)
            } else {
                self.algorithm.hash_bytes(&file.content)
            };
            let _ = writeln!(manifest, "{},{recorded}", file.path);
        }
        fs::write(config.manifest_path(server, &self.backup_id), manifest)?;

        Ok(Arc::new(config))
    }
}

fn write_file(root: &Path, relative: &str, content: &[u8]) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

//! Configuration for the backup manager.
//!
//! The configuration is read-only once loaded and shared between workers as
//! `Arc<Configuration>`.

use crate::errors::ConfigError;
use crate::logging::LoggingConfig;
use crate::verify::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name of the manifest file inside a backup directory.
pub const MANIFEST_FILE: &str = "backup.manifest";

/// Name of the data directory inside a backup directory.
pub const DATA_DIRECTORY: &str = "data";

/// A database server whose backups are managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name, also the directory name under `base_dir`.
    pub name: String,
    /// Manifest hash algorithm, overriding the global one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<HashAlgorithm>,
}

impl ServerConfig {
    /// Creates a server entry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash_algorithm: None,
        }
    }

    /// Sets the manifest hash algorithm for this server.
    #[must_use]
    pub const fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(algorithm);
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Root directory holding `<server>/backup/<id>` trees.
    pub base_dir: PathBuf,
    /// Configured servers; requests address them by index.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// Default manifest hash algorithm.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Configuration {
    /// Creates a configuration with no servers.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            servers: Vec::new(),
            hash_algorithm: HashAlgorithm::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Adds a server.
    #[must_use]
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.servers.push(server);
        self
    }

    /// Sets the default hash algorithm.
    #[must_use]
    pub const fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed JSON or failed validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on empty or duplicate server names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::Invalid("server name cannot be empty".to_string()));
            }
            if server.name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "server name '{}' cannot contain path separators",
                    server.name
                )));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Looks up a server by index.
    #[must_use]
    pub fn server(&self, index: usize) -> Option<&ServerConfig> {
        self.servers.get(index)
    }

    /// Returns the hash algorithm used for a server's manifests.
    #[must_use]
    pub fn hash_algorithm_for(&self, server: &ServerConfig) -> HashAlgorithm {
        server.hash_algorithm.unwrap_or(self.hash_algorithm)
    }

    /// Returns `<base_dir>/<server>/backup/<backup_id>`.
    #[must_use]
    pub fn backup_dir(&self, server: &ServerConfig, backup_id: &str) -> PathBuf {
        self.base_dir.join(&server.name).join("backup").join(backup_id)
    }

    /// Returns the data directory of a backup.
    #[must_use]
    pub fn backup_data_dir(&self, server: &ServerConfig, backup_id: &str) -> PathBuf {
        self.backup_dir(server, backup_id).join(DATA_DIRECTORY)
    }

    /// Returns the manifest path of a backup.
    #[must_use]
    pub fn manifest_path(&self, server: &ServerConfig, backup_id: &str) -> PathBuf {
        self.backup_dir(server, backup_id).join(MANIFEST_FILE)
    }
}

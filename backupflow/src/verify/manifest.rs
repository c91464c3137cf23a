//! Reading backup manifests.
//!
//! A manifest is a CSV document whose first line is the `File,Hash` header,
//! followed by one `path,hash` line per file, paths relative to the backup's
//! data directory.

use crate::context::ExecutionContext;
use crate::errors::{ContextError, DataConflictError};
use thiserror::Error;

/// The manifest header line.
pub const MANIFEST_HEADER: &str = "File,Hash";

/// Errors from parsing a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The first line is not the expected header.
    #[error("manifest header missing, expected '{MANIFEST_HEADER}'")]
    MissingHeader,

    /// A line has no hash column.
    #[error("manifest line {line} is malformed")]
    Malformed {
        /// 1-based line number.
        line: usize,
    },

    /// A file is listed twice.
    #[error("manifest lists '{0}' twice")]
    Duplicate(String),
}

/// The file hashes recorded for one backup, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    /// Parses a manifest document.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let mut lines = content.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header.trim() == MANIFEST_HEADER => {}
            _ => return Err(ManifestError::MissingHeader),
        }

        let mut manifest = Self::default();
        let mut seen = std::collections::HashSet::new();
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            // Hashes never contain commas; paths might.
            let (path, hash) = line
                .rsplit_once(',')
                .filter(|(p, h)| !p.is_empty() && !h.trim().is_empty())
                .ok_or(ManifestError::Malformed { line: index + 1 })?;
            if !seen.insert(path.to_string()) {
                return Err(ManifestError::Duplicate(path.to_string()));
            }
            manifest.entries.push((path.to_string(), hash.trim().to_string()));
        }
        Ok(manifest)
    }

    /// Returns `(path, hash)` pairs in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(p, h)| (p.as_str(), h.as_str()))
    }

    /// Returns the number of files listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no files are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores the manifest as an ordered nested map of path to hash.
    pub fn to_context(&self) -> Result<ExecutionContext, DataConflictError> {
        let mut map = ExecutionContext::new(true);
        for (path, hash) in self.iter() {
            map.insert(path, hash)?;
        }
        Ok(map)
    }

    /// Reads a manifest back from its nested-map form.
    pub fn from_context(map: &ExecutionContext) -> Result<Self, ContextError> {
        let entries = map
            .keys()
            .into_iter()
            .map(|path| Ok((path.to_string(), map.get_str(path)?.to_string())))
            .collect::<Result<_, ContextError>>()?;
        Ok(Self { entries })
    }
}

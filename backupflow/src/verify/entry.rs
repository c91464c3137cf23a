//! Per-file verification entries and their document forms.

use super::HashAlgorithm;
use crate::context::{keys, ContextValue, ExecutionContext};
use crate::errors::{BackupflowError, ContextError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Document format for [`VerifyEntry::to_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// A JSON object.
    #[default]
    Json,
    /// Flat `key: value` lines.
    Text,
}

/// The integrity result of one backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyEntry {
    /// Directory the file was checked in.
    pub directory: String,
    /// File path, relative to `directory`.
    pub filename: String,
    /// Hash recorded in the manifest.
    pub original: String,
    /// Hash computed from the file on disk.
    pub calculated: String,
    /// Algorithm both hashes were produced with.
    pub hash_algorithm: HashAlgorithm,
}

impl VerifyEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(
        directory: impl Into<String>,
        filename: impl Into<String>,
        original: impl Into<String>,
        calculated: impl Into<String>,
        hash_algorithm: HashAlgorithm,
    ) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
            original: original.into(),
            calculated: calculated.into(),
            hash_algorithm,
        }
    }

    /// Returns true if the recorded and computed hashes agree.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.original == self.calculated
    }

    /// Renders the entry as a document.
    ///
    /// `tag` wraps the fields in a named object, `indent` is the number of
    /// spaces per nesting level (0 renders compact JSON).
    ///
    /// # Errors
    ///
    /// Returns `BackupflowError::Serialization` if JSON encoding fails.
    pub fn to_document(
        &self,
        format: OutputFormat,
        tag: Option<&str>,
        indent: usize,
    ) -> Result<String, BackupflowError> {
        match format {
            OutputFormat::Json => self.to_json(tag, indent),
            OutputFormat::Text => Ok(self.to_text(tag, indent)),
        }
    }

    /// Decodes a document produced by [`VerifyEntry::to_document`].
    ///
    /// # Errors
    ///
    /// Returns `BackupflowError::Serialization` on malformed input.
    pub fn from_document(
        document: &str,
        format: OutputFormat,
        tag: Option<&str>,
    ) -> Result<Self, BackupflowError> {
        match format {
            OutputFormat::Json => match tag {
                Some(tag) => {
                    let mut wrapped: BTreeMap<String, Self> = serde_json::from_str(document)?;
                    wrapped.remove(tag).ok_or_else(|| {
                        BackupflowError::Serialization(format!("Missing tag '{tag}'"))
                    })
                }
                None => Ok(serde_json::from_str(document)?),
            },
            OutputFormat::Text => Self::from_text(document, tag),
        }
    }

    fn to_json(&self, tag: Option<&str>, indent: usize) -> Result<String, BackupflowError> {
        if indent == 0 {
            return Ok(match tag {
                Some(tag) => serde_json::to_string(&BTreeMap::from([(tag, self)]))?,
                None => serde_json::to_string(self)?,
            });
        }

        let pad = " ".repeat(indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        match tag {
            Some(tag) => BTreeMap::from([(tag, self)]).serialize(&mut serializer)?,
            None => self.serialize(&mut serializer)?,
        }
        String::from_utf8(out).map_err(|e| BackupflowError::Serialization(e.to_string()))
    }

    fn to_text(&self, tag: Option<&str>, indent: usize) -> String {
        let mut out = String::new();
        let mut pad = String::new();

        if let Some(tag) = tag {
            let _ = writeln!(out, "{tag}:");
            pad = " ".repeat(indent);
        }

        // Strings are written JSON-quoted so any byte sequence survives.
        for (key, value) in [
            ("directory", &self.directory),
            ("filename", &self.filename),
            ("original", &self.original),
            ("calculated", &self.calculated),
        ] {
            let _ = writeln!(out, "{pad}{key}: {}", quote(value));
        }
        let _ = writeln!(out, "{pad}hash_algorithm: {}", self.hash_algorithm.id());
        out
    }

    fn from_text(document: &str, tag: Option<&str>) -> Result<Self, BackupflowError> {
        let mut lines = document.lines().filter(|l| !l.trim().is_empty());

        if let Some(tag) = tag {
            let header = lines.next().unwrap_or_default();
            if header.trim() != format!("{tag}:") {
                return Err(BackupflowError::Serialization(format!("Missing tag '{tag}'")));
            }
        }

        let mut fields: BTreeMap<&str, &str> = BTreeMap::new();
        for line in lines {
            let (key, value) = line.trim_start().split_once(": ").ok_or_else(|| {
                BackupflowError::Serialization(format!("Malformed line '{line}'"))
            })?;
            fields.insert(key, value);
        }

        let field = |name: &str| -> Result<String, BackupflowError> {
            let raw = fields
                .get(name)
                .ok_or_else(|| BackupflowError::Serialization(format!("Missing field '{name}'")))?;
            Ok(serde_json::from_str::<String>(raw)?)
        };

        let algorithm_raw = fields.get("hash_algorithm").ok_or_else(|| {
            BackupflowError::Serialization("Missing field 'hash_algorithm'".to_string())
        })?;
        let hash_algorithm: HashAlgorithm = serde_json::from_str(algorithm_raw)?;

        Ok(Self {
            directory: field("directory")?,
            filename: field("filename")?,
            original: field("original")?,
            calculated: field("calculated")?,
            hash_algorithm,
        })
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl From<&VerifyEntry> for ContextValue {
    fn from(entry: &VerifyEntry) -> Self {
        let mut map = ExecutionContext::new(true);
        // Fresh map, keys are distinct.
        let _ = map.insert("directory", entry.directory.as_str());
        let _ = map.insert("filename", entry.filename.as_str());
        let _ = map.insert("original", entry.original.as_str());
        let _ = map.insert("calculated", entry.calculated.as_str());
        let _ = map.insert("hash_algorithm", entry.hash_algorithm.id());
        Self::Map(map)
    }
}

impl TryFrom<&ContextValue> for VerifyEntry {
    type Error = ContextError;

    fn try_from(value: &ContextValue) -> Result<Self, Self::Error> {
        let map = value
            .as_map()
            .ok_or_else(|| ContextError::type_mismatch("entry", "map", value.kind()))?;
        let id = map.get_int("hash_algorithm")?;
        let hash_algorithm = HashAlgorithm::from_id(id)
            .ok_or_else(|| ContextError::type_mismatch("hash_algorithm", "hash algorithm id", "int"))?;

        Ok(Self {
            directory: map.get_str("directory")?.to_string(),
            filename: map.get_str("filename")?.to_string(),
            original: map.get_str("original")?.to_string(),
            calculated: map.get_str("calculated")?.to_string(),
            hash_algorithm,
        })
    }
}

/// Records a checked file in the context aggregations.
///
/// The entry always goes into `all`, and into `failed` as well when its
/// hashes differ. Both lists must already exist. Returns whether it matched.
///
/// # Errors
///
/// Returns `ContextError` if either list is missing or not a list.
pub fn record_entry(ctx: &mut ExecutionContext, entry: &VerifyEntry) -> Result<bool, ContextError> {
    let matched = entry.is_match();

    // Check `failed` first so a bad context never leaves the entry in only one list.
    if !matched {
        ctx.get_list_mut(keys::FAILED)?;
    }
    ctx.get_list_mut(keys::ALL)?.push(entry.into());
    if !matched {
        ctx.get_list_mut(keys::FAILED)?.push(entry.into());
    }

    Ok(matched)
}

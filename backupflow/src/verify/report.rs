//! The structured verify report sent to the requesting client.

use super::VerifyEntry;
use crate::context::{keys, ExecutionContext};
use crate::errors::BackupflowError;
use serde::{Deserialize, Serialize};

/// Aggregated verify results: the mismatching entries and every entry checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Entries whose recorded and computed hashes differ.
    pub failed: Vec<VerifyEntry>,
    /// Every entry that was checked.
    pub all: Vec<VerifyEntry>,
}

impl VerifyReport {
    /// Reads both aggregations out of a finished verify context.
    ///
    /// # Errors
    ///
    /// Returns `MissingResult` when a list is absent and `ResultCopy` when a
    /// list or one of its entries has the wrong shape.
    pub fn from_context(ctx: &ExecutionContext) -> Result<Self, BackupflowError> {
        Ok(Self {
            failed: read_entries(ctx, keys::FAILED)?,
            all: read_entries(ctx, keys::ALL)?,
        })
    }

    /// Returns true if no file mismatched.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn read_entries(ctx: &ExecutionContext, key: &str) -> Result<Vec<VerifyEntry>, BackupflowError> {
    let items = ctx.get_list(key).map_err(|source| {
        if source.is_missing() {
            BackupflowError::MissingResult { key: key.to_string() }
        } else {
            BackupflowError::ResultCopy {
                key: key.to_string(),
                source,
            }
        }
    })?;

    items
        .iter()
        .map(|item| {
            VerifyEntry::try_from(item).map_err(|source| BackupflowError::ResultCopy {
                key: key.to_string(),
                source,
            })
        })
        .collect()
}

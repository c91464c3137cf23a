//! Execution context for workflow runs.
//!
//! This module provides:
//! - Tagged context values (string, integer, flag, list, nested map)
//! - The ordered, owned execution context shared by the stages of one run
//! - The well-known keys exchanged between orchestrators and stages

mod execution;
mod value;

pub use execution::ExecutionContext;
pub use value::ContextValue;

/// Well-known context keys.
pub mod keys {
    /// Recovery target expression; empty for a full restore.
    pub const POSITION: &str = "position";
    /// Destination directory.
    pub const DIRECTORY: &str = "directory";
    /// File filter expression for verify; empty for all files.
    pub const FILES: &str = "files";
    /// Primary result, set by the stages (e.g. the restored directory).
    pub const OUTPUT: &str = "output";
    /// Identifier of the processed backup, set by the stages.
    pub const IDENTIFIER: &str = "identifier";
    /// Verify entries whose hashes did not match.
    pub const FAILED: &str = "failed";
    /// Every verify entry that was checked.
    pub const ALL: &str = "all";
    /// Manifest of the backup being verified, as a map of path to hash.
    pub const MANIFEST: &str = "manifest";
    /// Directory created by the copy stage during this run.
    pub const COPIED: &str = "copied";
    /// Set by the workflow once the setup and execute passes both succeeded.
    pub const COMPLETED: &str = "completed";
}

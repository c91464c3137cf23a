//! Error types for backupflow.
//!
//! Every failure inside a restore or verify call maps onto one
//! [`BackupflowError`] kind. The kinds stay distinct in logs; at the client
//! boundary they collapse into the boolean success flag of the result envelope.

use crate::stages::Phase;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for backupflow operations.
#[derive(Debug, Error)]
pub enum BackupflowError {
    /// The execution context could not be assembled.
    #[error("Context build failure: {0}")]
    ContextBuild(#[from] DataConflictError),

    /// A stage reported failure during the setup pass.
    #[error("Stage '{stage}' failed during setup: {message}")]
    StageSetup {
        /// The stage name.
        stage: String,
        /// The failure message reported by the stage.
        message: String,
    },

    /// A stage reported failure during the execute pass.
    #[error("Stage '{stage}' failed during execute: {message}")]
    StageExecute {
        /// The stage name.
        stage: String,
        /// The failure message reported by the stage.
        message: String,
    },

    /// A stage reported failure during the teardown pass.
    #[error("Stage '{stage}' failed during teardown: {message}")]
    StageTeardown {
        /// The stage name.
        stage: String,
        /// The failure message reported by the stage.
        message: String,
    },

    /// The workflow succeeded but a required result key is absent.
    #[error("Workflow completed without a result for '{key}'")]
    MissingResult {
        /// The missing context key.
        key: String,
    },

    /// A result could not be copied out of the context.
    #[error("Result copy failure for '{key}': {source}")]
    ResultCopy {
        /// The context key being copied.
        key: String,
        /// The underlying context error.
        #[source]
        source: ContextError,
    },

    /// The server index does not name a configured server.
    #[error("Unknown server index {0}")]
    UnknownServer(usize),

    /// A workflow could not be assembled.
    #[error("{0}")]
    Validation(#[from] WorkflowValidationError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupflowError {
    /// Creates the error matching a failed phase call.
    #[must_use]
    pub fn stage_failure(phase: Phase, stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let message = message.into();
        match phase {
            Phase::Setup => Self::StageSetup { stage, message },
            Phase::Execute => Self::StageExecute { stage, message },
            Phase::Teardown => Self::StageTeardown { stage, message },
        }
    }

    /// Returns a stable, machine-readable name for the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContextBuild(_) => ErrorKind::ContextBuildFailure,
            Self::StageSetup { .. } => ErrorKind::StageSetupFailure,
            Self::StageExecute { .. } => ErrorKind::StageExecuteFailure,
            Self::StageTeardown { .. } => ErrorKind::StageTeardownFailure,
            Self::MissingResult { .. } => ErrorKind::MissingResultFailure,
            Self::ResultCopy { .. } => ErrorKind::ResultCopyFailure,
            Self::UnknownServer(_) | Self::Validation(_) | Self::Config(_) => ErrorKind::Configuration,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<serde_json::Error> for BackupflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Coarse classification of [`BackupflowError`] for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Duplicate key while assembling the context.
    ContextBuildFailure,
    /// A setup phase failed.
    StageSetupFailure,
    /// An execute phase failed.
    StageExecuteFailure,
    /// A teardown phase failed.
    StageTeardownFailure,
    /// `output` or `identifier` absent after a successful run.
    MissingResultFailure,
    /// Copying a result out of the context failed.
    ResultCopyFailure,
    /// Server lookup, workflow assembly or configuration problem.
    Configuration,
    /// IO or serialization problem.
    Io,
}

/// Error raised when inserting an existing key into an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Data conflict: key '{key}' already exists")]
pub struct DataConflictError {
    /// The conflicting key.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised by the typed accessors of an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The key is not present.
    #[error("Key '{key}' not found in context")]
    Missing {
        /// The requested key.
        key: String,
    },

    /// The key is present but holds a different kind of value.
    #[error("Key '{key}' holds a {found} value, expected {expected}")]
    TypeMismatch {
        /// The requested key.
        key: String,
        /// The expected value kind.
        expected: &'static str,
        /// The stored value kind.
        found: &'static str,
    },
}

impl ContextError {
    /// Creates a missing-key error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(key: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected,
            found,
        }
    }

    /// Returns true if the key was absent.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Error raised when a workflow cannot be assembled.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WorkflowValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl WorkflowValidationError {
    /// Creates a new workflow validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read configuration '{path}': {source}")]
    Read {
        /// The file path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid JSON for this schema.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A semantic check failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

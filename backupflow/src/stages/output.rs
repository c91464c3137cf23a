//! Stage status and output types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The phase of a stage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Preparation before any stage executes.
    Setup,
    /// The main work.
    Execute,
    /// Cleanup after the run.
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Execute => write!(f, "execute"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// The result status of a phase call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The call completed.
    #[default]
    Ok,
    /// The call had nothing to do.
    Skip,
    /// The call failed.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// The output of a single phase call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// The call status.
    pub status: StageStatus,

    /// Error message for failed calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Skip reason for skipped calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Additional metadata, forwarded to workflow events.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Creates a skip output with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skip,
            skip_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true unless the call failed. A skip counts as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status != StageStatus::Fail
    }

    /// Returns true if the call failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Fail
    }

    /// Returns the failure message, or a generic one if none was given.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("stage reported failure")
    }
}

impl<E: std::error::Error> From<Result<(), E>> for StageOutput {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

//! # Backupflow
//!
//! Restore and verify workflows for database backups.
//!
//! Backupflow runs maintenance operations as ordered chains of stages over a
//! shared execution context:
//!
//! - **Workflows**: setup, execute and teardown passes over a stage chain
//! - **Execution context**: typed, owned values exchanged between stages
//! - **Verification**: per-file hash checks aggregated into a report
//! - **Client reporting**: one result envelope per operation
//! - **WAL descriptions**: human-readable rendering of WAL records
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use backupflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = Arc::new(Configuration::from_file("backupflow.json")?);
//! init_logging(&config.logging)?;
//!
//! let service = Arc::new(MaintenanceService::new(config));
//! let client = StreamConnection::new(socket);
//! let ok = service
//!     .spawn_verify(client, VerifyRequest::new(0, "20240101120000", "/tmp/verify", ""))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod logging;
pub mod maintenance;
pub mod management;
pub mod pipeline;
pub mod stages;
pub mod utils;
pub mod verify;
pub mod wal;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Configuration, ServerConfig};
    pub use crate::context::{keys, ContextValue, ExecutionContext};
    pub use crate::errors::{
        BackupflowError, ConfigError, ContextError, DataConflictError, ErrorKind,
        WorkflowValidationError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, WorkflowEvent};
    pub use crate::logging::{init_logging, LogFormat, LoggingConfig};
    pub use crate::maintenance::{
        restore_backup, verify_backup, MaintenanceService, RestoreOutcome, RestoreRequest,
        VerifyRequest,
    };
    pub use crate::management::{ClientConnection, ResultEnvelope, StreamConnection};
    pub use crate::pipeline::{
        StandardWorkflowFactory, Workflow, WorkflowBuilder, WorkflowFactory, WorkflowKind,
    };
    pub use crate::stages::{Phase, Stage, StageOutput, StageStatus};
    pub use crate::verify::{HashAlgorithm, OutputFormat, VerifyEntry, VerifyReport};
    pub use crate::wal::{describe_record, DecodedRecord, WalError};
}

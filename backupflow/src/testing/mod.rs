//! Testing utilities.
//!
//! This module provides:
//! - Mock stages recording their phase calls
//! - An in-memory client connection
//! - On-disk backup fixtures
//! - Captured log output

mod fixtures;
mod logs;
mod mocks;

pub use fixtures::BackupFixture;
pub use logs::CapturedLogs;
pub use mocks::{call_log, CallLog, CollectingConnection, RecordingStage, ResultStage};

//! WAL record descriptions.
//!
//! A [`DecodedRecord`] is described by the resource manager that wrote it.
//! Descriptors append a human-readable rendering to a caller-owned buffer and
//! leave it untouched when they fail.

mod logicalmsg;
mod rmgr;

pub use logicalmsg::{logicalmsg_desc, LOGICAL_MESSAGE_HEADER_SIZE, XLOG_LOGICAL_MESSAGE};
pub use rmgr::{describe_record, resource_manager, ResourceManager, RM_LOGICALMSG_ID};

use thiserror::Error;

/// Low bits of the info byte reserved for the WAL machinery.
pub const XLR_INFO_MASK: u8 = 0x0F;

/// Errors from describing a WAL record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalError {
    /// The record payload does not match its declared layout.
    #[error("malformed {rmgr} record: {reason}")]
    Malformed {
        /// Resource manager name.
        rmgr: &'static str,
        /// What is wrong.
        reason: String,
    },

    /// No descriptor is registered for the resource manager id.
    #[error("unknown resource manager id {0}")]
    UnknownResourceManager(u8),
}

/// A WAL record with its header fields already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Resource manager id.
    pub rmid: u8,
    /// Info byte; the high bits select the record subtype.
    pub info: u8,
    /// Main data of the record.
    pub data: Vec<u8>,
}

impl DecodedRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(rmid: u8, info: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            rmid,
            info,
            data: data.into(),
        }
    }

    /// Returns the record subtype bits of the info byte.
    #[must_use]
    pub const fn subtype(&self) -> u8 {
        self.info & !XLR_INFO_MASK
    }
}

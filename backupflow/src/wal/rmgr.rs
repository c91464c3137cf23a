//! Resource manager dispatch table.

use super::{logicalmsg_desc, DecodedRecord, WalError};

/// Resource manager id of logical decoding messages.
pub const RM_LOGICALMSG_ID: u8 = 21;

/// A registered resource manager.
#[derive(Debug, Clone, Copy)]
pub struct ResourceManager {
    /// Resource manager id.
    pub id: u8,
    /// Display name.
    pub name: &'static str,
    /// Appends a record description to a buffer.
    pub desc: fn(&mut String, &DecodedRecord) -> Result<(), WalError>,
}

static RESOURCE_MANAGERS: &[ResourceManager] = &[ResourceManager {
    id: RM_LOGICALMSG_ID,
    name: "LogicalMessage",
    desc: logicalmsg_desc,
}];

/// Looks up the resource manager registered for `id`.
#[must_use]
pub fn resource_manager(id: u8) -> Option<&'static ResourceManager> {
    RESOURCE_MANAGERS.iter().find(|rm| rm.id == id)
}

/// Appends the description of `record` to `buf` using its resource manager.
///
/// # Errors
///
/// Returns `UnknownResourceManager` for unregistered ids, or the descriptor's
/// error. `buf` is unchanged on error.
pub fn describe_record(buf: &mut String, record: &DecodedRecord) -> Result<(), WalError> {
    let rm = resource_manager(record.rmid).ok_or(WalError::UnknownResourceManager(record.rmid))?;
    (rm.desc)(buf, record)
}

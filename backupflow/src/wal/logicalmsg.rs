//! Logical decoding messages.

use super::{DecodedRecord, WalError};
use std::fmt::Write as _;

/// Info subtype of a logical message record.
pub const XLOG_LOGICAL_MESSAGE: u8 = 0x00;

/// Size of the fixed part of a logical message: database oid, transactional
/// flag with padding, prefix size and message size.
pub const LOGICAL_MESSAGE_HEADER_SIZE: usize = 24;

const RMGR_NAME: &str = "LogicalMessage";

#[derive(Debug)]
struct LogicalMessage<'a> {
    transactional: bool,
    prefix: &'a [u8],
    message: &'a [u8],
}

impl<'a> LogicalMessage<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, WalError> {
        let header = data
            .get(..LOGICAL_MESSAGE_HEADER_SIZE)
            .ok_or_else(|| malformed(format!("{} bytes, header needs {LOGICAL_MESSAGE_HEADER_SIZE}", data.len())))?;

        let transactional = header[4] != 0;
        let prefix_size = read_size(&header[8..16])?;
        let message_size = read_size(&header[16..24])?;

        let body = &data[LOGICAL_MESSAGE_HEADER_SIZE..];
        let total = prefix_size
            .checked_add(message_size)
            .ok_or_else(|| malformed("sizes overflow".to_string()))?;
        if body.len() < total {
            return Err(malformed(format!("{} payload bytes, header declares {total}", body.len())));
        }

        let (prefix, rest) = body.split_at(prefix_size);
        if prefix.last() != Some(&0) {
            return Err(malformed("prefix is not NUL-terminated".to_string()));
        }
        // The prefix is a C string; anything after its first NUL is padding.
        let end = prefix.iter().position(|&b| b == 0).unwrap_or(prefix.len());

        Ok(Self {
            transactional,
            prefix: &prefix[..end],
            message: &rest[..message_size],
        })
    }
}

fn read_size(bytes: &[u8]) -> Result<usize, WalError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| malformed("size field truncated".to_string()))?;
    usize::try_from(u64::from_le_bytes(raw)).map_err(|_| malformed("size does not fit in memory".to_string()))
}

fn malformed(reason: String) -> WalError {
    WalError::Malformed {
        rmgr: RMGR_NAME,
        reason,
    }
}

/// Appends the description of a logical message record to `buf`.
///
/// The output reads
/// `transactional, prefix "<prefix>"; payload (<n> bytes): 41 42`.
/// Records of any other subtype append nothing.
pub fn logicalmsg_desc(buf: &mut String, record: &DecodedRecord) -> Result<(), WalError> {
    if record.subtype() != XLOG_LOGICAL_MESSAGE {
        return Ok(());
    }

    let msg = LogicalMessage::parse(&record.data)?;
    let mut out = format!(
        "{}, prefix \"{}\"; payload ({} bytes): ",
        if msg.transactional { "transactional" } else { "non-transactional" },
        String::from_utf8_lossy(msg.prefix),
        msg.message.len()
    );
    for (i, byte) in msg.message.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }

    buf.push_str(&out);
    Ok(())
}

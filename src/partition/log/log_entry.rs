use crate::commitlog;
use crate::partition::Term;
use bytes::{Buf, BufMut, Bytes};
use std::convert::TryFrom;
use std::io;

/// Byte representation:
///
/// ```text
/// |                                         1                                   2           |
/// | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | ...     |
/// +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+-...-----+
/// |Vrs|       Term (8 bytes)          |     Timestamp (8 bytes)       |  Value (variable)   |
/// +---+-------------------------------+-------------------------------+-------------...-----+
/// ```
///
/// * `Vrs` - version of the serialized payload
/// * `Term` - term of the leader that appended this entry, little endian
/// * `Timestamp` - leader's wall clock at append time in millis since epoch, little endian
/// * `Value` - opaque app payload
///
/// Size of `Value` is not stored; the underlying commitlog gives us the correctly sized array.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LogEntry {
    pub(crate) term: Term,
    pub(crate) timestamp: i64,
    pub(crate) value: Bytes,
}

const LOG_ENTRY_FORMAT_VERSION: u8 = 1;
const HEADER_SIZE: usize = 1 + 8 + 8;

impl commitlog::Entry for LogEntry {}

impl TryFrom<Vec<u8>> for LogEntry {
    type Error = io::Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Log entry is {} bytes, expected at least {}", bytes.len(), HEADER_SIZE),
            ));
        }

        let mut buf = Bytes::from(bytes);
        let version = buf.get_u8();
        if version != LOG_ENTRY_FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown log entry format version {}", version),
            ));
        }
        let term = Term::new(buf.get_u64_le());
        let timestamp = buf.get_i64_le();

        // What's left is the value.
        Ok(LogEntry {
            term,
            timestamp,
            value: buf,
        })
    }
}

impl Into<Vec<u8>> for LogEntry {
    fn into(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.value.len());
        bytes.put_u8(LOG_ENTRY_FORMAT_VERSION);
        bytes.put_u64_le(self.term.as_u64());
        bytes.put_i64_le(self.timestamp);
        bytes.put_slice(&self.value);

        bytes
    }
}

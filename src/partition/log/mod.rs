//! This module is the partition-specific log that wraps the generic commit log. It knows about
//! terms, timestamps and which prefix of the log is committed.

mod log_entry;
mod partition_log;
mod reader;

pub(crate) use log_entry::LogEntry;
pub(crate) use partition_log::PartitionLog;
pub(crate) use reader::Indexed;
pub(crate) use reader::LogReader;
pub(crate) use reader::ReaderMode;

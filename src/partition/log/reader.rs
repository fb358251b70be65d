use crate::commitlog::{Index, Log};
use crate::partition::log::{LogEntry, PartitionLog};
use std::cmp;
use std::io;

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum ReaderMode {
    /// Read everything that was written locally.
    All,
    /// Never read past the commit index.
    Commits,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Indexed {
    pub(crate) index: Index,
    pub(crate) entry: LogEntry,
}

/// LogReader is a cursor over a PartitionLog. It doesn't borrow the log, so it can live inside
/// state owned next to the log; every read takes the log explicitly.
///
/// A reader positioned before the first retained index skips ahead to it on the next read.
#[derive(Debug)]
pub(crate) struct LogReader {
    next_index: Index,
    mode: ReaderMode,
    open: bool,
}

impl LogReader {
    pub(super) fn new(index: Index, mode: ReaderMode) -> Self {
        LogReader {
            next_index: index,
            mode,
            open: true,
        }
    }

    fn position<L: Log<LogEntry>>(&self, log: &PartitionLog<L>) -> Index {
        cmp::max(self.next_index, log.first_index())
    }

    pub(crate) fn has_next<L: Log<LogEntry>>(&self, log: &PartitionLog<L>) -> bool {
        if !self.open {
            return false;
        }

        let position = self.position(log);
        if position >= log.next_index() {
            return false;
        }

        match self.mode {
            ReaderMode::All => true,
            ReaderMode::Commits => matches!(log.commit_index(), Some(ci) if position <= ci),
        }
    }

    pub(crate) fn next<L: Log<LogEntry>>(&mut self, log: &PartitionLog<L>) -> Result<Option<Indexed>, io::Error> {
        if !self.has_next(log) {
            return Ok(None);
        }

        let index = self.position(log);
        match log.read(index)? {
            Some(entry) => {
                self.next_index = index.plus(1);
                Ok(Some(Indexed { index, entry }))
            }
            None => Ok(None),
        }
    }

    /// Reposition the reader so the next read returns `index` (or the first retained index, if
    /// `index` was compacted away).
    pub(crate) fn reset(&mut self, index: Index) {
        self.next_index = index;
    }

    pub(crate) fn first_index<L: Log<LogEntry>>(&self, log: &PartitionLog<L>) -> Index {
        log.first_index()
    }

    pub(crate) fn next_index(&self) -> Index {
        self.next_index
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::InMemoryLog;
    use crate::partition::Term;
    use bytes::Bytes;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn log_with_entries(n: u64) -> PartitionLog<InMemoryLog<LogEntry>> {
        let mut log = PartitionLog::new(logger(), InMemoryLog::create(logger()).unwrap()).unwrap();
        for i in 1..=n {
            log.append(LogEntry {
                term: Term::new(1),
                timestamp: i as i64,
                value: Bytes::from(format!("value-{}", i)),
            })
            .unwrap();
        }

        log
    }

    fn read_all<L: Log<LogEntry>>(reader: &mut LogReader, log: &PartitionLog<L>) -> Vec<u64> {
        let mut indexes = Vec::new();
        while let Some(indexed) = reader.next(log).unwrap() {
            indexes.push(indexed.index.as_u64());
        }

        indexes
    }

    #[test]
    fn commits_mode_stops_at_commit_index() {
        let mut log = log_with_entries(5);
        log.ratchet_fwd_commit_index(Index::new(3));

        let mut reader = log.open_reader(Index::start_index(), ReaderMode::Commits);
        assert_eq!(read_all(&mut reader, &log), vec![1, 2, 3]);
        assert!(!reader.has_next(&log));

        log.ratchet_fwd_commit_index(Index::new(5));
        assert!(reader.has_next(&log));
        assert_eq!(read_all(&mut reader, &log), vec![4, 5]);
    }

    #[test]
    fn all_mode_reads_uncommitted_entries() {
        let log = log_with_entries(3);

        let mut reader = log.open_reader(Index::new(2), ReaderMode::All);
        assert_eq!(read_all(&mut reader, &log), vec![2, 3]);
    }

    #[test]
    fn reset_repositions_reader() {
        let mut log = log_with_entries(5);
        log.commit_all();

        let mut reader = log.open_reader(Index::new(5), ReaderMode::Commits);
        assert_eq!(read_all(&mut reader, &log), vec![5]);

        reader.reset(Index::new(2));
        assert_eq!(reader.next_index(), Index::new(2));
        assert_eq!(read_all(&mut reader, &log), vec![2, 3, 4, 5]);
    }

    #[test]
    fn reader_skips_compacted_prefix() {
        let mut log = log_with_entries(5);
        log.commit_all();
        log.compact(Index::new(4));

        let mut reader = log.open_reader(Index::start_index(), ReaderMode::Commits);
        assert_eq!(reader.first_index(&log), Index::new(4));
        assert_eq!(read_all(&mut reader, &log), vec![4, 5]);
    }

    #[test]
    fn closed_reader_reads_nothing() {
        let mut log = log_with_entries(2);
        log.commit_all();

        let mut reader = log.open_reader(Index::start_index(), ReaderMode::Commits);
        reader.close();

        assert!(!reader.is_open());
        assert_eq!(reader.next(&log).unwrap(), None);
    }
}

use crate::commitlog::{Index, Log};
use crate::partition::log::{LogEntry, LogReader, ReaderMode};
use crate::partition::Term;
use std::io;

/// PartitionLog is the partition-specific log facade.
///
/// Note: A log entry has 2 states (not modeled directly in code):
/// 1. Persisted - written locally, not yet accepted by the replication strategy
/// 2. Committed - written locally and accepted by the replication strategy
///
/// Consumers only ever observe committed entries. A log entry's state has no global truth. Each
/// member will have its own local view of what state the log entry is in.
pub(crate) struct PartitionLog<L: Log<LogEntry>> {
    // Application's info/debug log.
    logger: slog::Logger,

    // This is the log that we're replicating.
    log: L,
    // Metadata about the highest log entry that we've locally written. It must be updated atomically.
    latest_entry_metadata: Option<(Term, Index)>,

    // Index of highest log entry known to be committed. None if nothing is committed.
    commit_index: Option<Index>,
}

impl<L: Log<LogEntry>> PartitionLog<L> {
    pub(crate) fn new(logger: slog::Logger, log: L) -> Result<Self, io::Error> {
        let latest_entry_metadata = match log.next_index().checked_minus(1) {
            Some(last_index) if last_index >= log.first_index() => {
                log.read(last_index)?.map(|entry| (entry.term, last_index))
            }
            _ => None,
        };

        Ok(PartitionLog {
            logger,
            log,
            latest_entry_metadata,
            commit_index: None,
        })
    }

    pub(crate) fn latest_entry(&self) -> Option<(Term, Index)> {
        self.latest_entry_metadata
    }

    pub(crate) fn last_index(&self) -> Option<Index> {
        self.latest_entry_metadata.map(|(_, index)| index)
    }

    pub(crate) fn first_index(&self) -> Index {
        self.log.first_index()
    }

    pub(crate) fn next_index(&self) -> Index {
        self.log.next_index()
    }

    pub(crate) fn read(&self, index: Index) -> Result<Option<LogEntry>, io::Error> {
        self.log.read(index)
    }

    pub(crate) fn append(&mut self, entry: LogEntry) -> Result<Index, io::Error> {
        let appended_term = entry.term;
        let appended_index = self.log.append(entry)?;
        // Only update state after log action completes.
        self.latest_entry_metadata = Some((appended_term, appended_index));

        Ok(appended_index)
    }

    /// Remove anything starting at `index` and later.
    pub(crate) fn truncate(&mut self, index: Index) -> Result<(), io::Error> {
        let mut new_latest_entry_metadata = None;
        if let Some(new_latest_entry_index) = index.checked_minus(1) {
            if new_latest_entry_index >= self.log.first_index() {
                new_latest_entry_metadata = self
                    .read(new_latest_entry_index)?
                    .map(|latest_entry| (latest_entry.term, new_latest_entry_index));
            }
        }

        // Only update log after we've successfully read what new state will be.
        self.log.truncate(index);
        self.latest_entry_metadata = new_latest_entry_metadata;

        if matches!(self.commit_index, Some(ci) if ci >= index) {
            slog::warn!(
                self.logger,
                "Truncating committed entries at {:?}. Commit index was {:?}.",
                index,
                self.commit_index
            );
            self.commit_index = index.checked_minus(1);
        }

        Ok(())
    }

    pub(crate) fn commit_index(&self) -> Option<Index> {
        self.commit_index
    }

    /// Move the commit index forward to `new_commit_index`, capped at our latest local entry.
    /// Stale values are ignored, so callers may report commits out of order.
    ///
    /// Returns true if the commit index moved.
    pub(crate) fn ratchet_fwd_commit_index(&mut self, new_commit_index: Index) -> bool {
        let latest_locally_written_index = match self.last_index() {
            Some(index) => index,
            None => {
                slog::warn!(
                    self.logger,
                    "Can't commit {:?}, we don't have any local entries",
                    new_commit_index
                );
                return false;
            }
        };
        let new_commit_index = std::cmp::min(new_commit_index, latest_locally_written_index);

        if matches!(self.commit_index, Some(ci) if ci >= new_commit_index) {
            return false;
        }

        self.commit_index.replace(new_commit_index);
        true
    }

    /// Treat everything we have locally as committed. Used when taking over as leader.
    pub(crate) fn commit_all(&mut self) {
        if let Some(last_index) = self.last_index() {
            self.ratchet_fwd_commit_index(last_index);
        }
    }

    /// Discard entries before `index`, but never anything that isn't committed yet. Returns the
    /// first index the log retains afterwards.
    pub(crate) fn compact(&mut self, index: Index) -> Index {
        let compaction_bound = self
            .commit_index
            .map(|ci| ci.plus(1))
            .unwrap_or_else(Index::start_index);
        let compact_to = std::cmp::min(index, compaction_bound);

        self.log.compact(compact_to);
        slog::info!(
            self.logger,
            "Compacted log to {:?} (requested {:?})",
            self.log.first_index(),
            index
        );

        self.log.first_index()
    }

    pub(crate) fn open_reader(&self, index: Index, mode: ReaderMode) -> LogReader {
        LogReader::new(index, mode)
    }
}

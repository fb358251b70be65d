use crate::commitlog::{Index, Log};
use crate::partition::log::PartitionLog;
use crate::partition::{BackupError, BackupInput, BackupOutput, LogEntry, MemberId, PersistentLocalState, Term};
use std::io;

/// PassiveRole is a replica that takes operations from a leader: a Follower under the consensus
/// protocol or a Backup under primary-backup. Both store what they're sent the same way.
pub(crate) struct PassiveRole {
    logger: slog::Logger,
    term: Term,
    leader: Option<MemberId>,
}

impl PassiveRole {
    pub(crate) fn new(logger: slog::Logger, term: Term, leader: Option<MemberId>) -> Self {
        PassiveRole { logger, term, leader }
    }

    pub(crate) fn term(&self) -> Term {
        self.term
    }

    pub(crate) fn leader(&self) -> Option<&MemberId> {
        self.leader.as_ref()
    }

    pub(crate) fn handle_backup<L: Log<LogEntry>>(
        &mut self,
        input: BackupInput,
        log: &mut PartitionLog<L>,
        local_state: &mut (dyn PersistentLocalState + Send),
    ) -> Result<BackupOutput, BackupError> {
        let current_term = local_state.current_term();
        if input.term < current_term {
            return Err(BackupError::StaleTerm { current_term });
        }
        if local_state.store_term_if_increased(input.term) {
            slog::info!(self.logger, "Leader {:?} moved us to term {:?}", input.leader_id, input.term);
        }
        self.term = input.term;
        if self.leader.as_ref() != Some(&input.leader_id) {
            slog::info!(self.logger, "Following leader {:?}", input.leader_id);
            self.leader.replace(input.leader_id);
        }

        if let Some((prev_index, prev_term)) = input.prev_entry {
            self.check_prev_entry(prev_index, prev_term, log)?;
        }

        let verified_index = match input.operations.last() {
            Some(operation) => Some(operation.index),
            None => input.prev_entry.map(|(prev_index, _)| prev_index),
        };
        for operation in input.operations {
            if operation.index < log.first_index() {
                // Compacted away, which only happens to committed entries.
                continue;
            }

            if operation.index < log.next_index() {
                match log.read(operation.index).map_err(BackupError::LocalIoError)? {
                    Some(existing) if existing.term == operation.term => continue,
                    _ => {
                        slog::warn!(
                            self.logger,
                            "Operation {:?} from term {:?} conflicts with our log, truncating",
                            operation.index,
                            operation.term
                        );
                        log.truncate(operation.index).map_err(BackupError::LocalIoError)?;
                    }
                }
            }

            let next_index = log.next_index();
            if operation.index > next_index {
                return Err(BackupError::IndexGap { next_index });
            }

            let appended_index = log
                .append(LogEntry {
                    term: operation.term,
                    timestamp: operation.timestamp,
                    value: operation.value,
                })
                .map_err(BackupError::LocalIoError)?;
            if appended_index != operation.index {
                slog::error!(
                    self.logger,
                    "Log stored operation {:?} at {:?}",
                    operation.index,
                    appended_index
                );
                return Err(BackupError::LocalIoError(io::Error::new(
                    io::ErrorKind::Other,
                    "log assigned an unexpected index",
                )));
            }
        }

        // Entries past what the leader just vouched for may still diverge from its log.
        if let (Some(commit_index), Some(verified_index)) = (input.commit_index, verified_index) {
            log.ratchet_fwd_commit_index(std::cmp::min(commit_index, verified_index));
        }

        Ok(BackupOutput {
            last_index: log.last_index(),
        })
    }

    fn check_prev_entry<L: Log<LogEntry>>(
        &self,
        prev_index: Index,
        prev_term: Term,
        log: &mut PartitionLog<L>,
    ) -> Result<(), BackupError> {
        if prev_index < log.first_index() {
            // Compacted away, which only happens to committed entries.
            return Ok(());
        }

        match log.read(prev_index).map_err(BackupError::LocalIoError)? {
            None => Err(BackupError::IndexGap {
                next_index: log.next_index(),
            }),
            Some(existing) if existing.term == prev_term => Ok(()),
            Some(existing) => {
                slog::warn!(
                    self.logger,
                    "Our entry {:?} is from term {:?}, leader has term {:?}",
                    prev_index,
                    existing.term,
                    prev_term
                );
                if matches!(log.commit_index(), Some(ci) if ci >= prev_index) {
                    slog::error!(self.logger, "Leader disagrees with committed entry {:?}", prev_index);
                } else {
                    log.truncate(prev_index).map_err(BackupError::LocalIoError)?;
                }

                Err(BackupError::EntryMismatch { index: prev_index })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::InMemoryLog;
    use crate::partition::test_utils::{self, operation};
    use crate::partition::{BackupOperation, VolatileLocalState};

    fn new_log() -> PartitionLog<InMemoryLog<LogEntry>> {
        PartitionLog::new(test_utils::logger(), InMemoryLog::create(test_utils::logger()).unwrap()).unwrap()
    }

    fn request(term: u64, commit_index: Option<u64>, operations: Vec<BackupOperation>) -> BackupInput {
        request_after(None, term, commit_index, operations)
    }

    fn request_after(
        prev_entry: Option<(u64, u64)>,
        term: u64,
        commit_index: Option<u64>,
        operations: Vec<BackupOperation>,
    ) -> BackupInput {
        BackupInput {
            leader_id: MemberId::new("leader"),
            term: Term::new(term),
            commit_index: commit_index.map(Index::new),
            operations,
            prev_entry: prev_entry.map(|(index, term)| (Index::new(index), Term::new(term))),
        }
    }

    fn terms<L: Log<LogEntry>>(log: &PartitionLog<L>) -> Vec<u64> {
        let mut terms = Vec::new();
        let mut index = log.first_index();
        while let Some(entry) = log.read(index).unwrap() {
            terms.push(entry.term.as_u64());
            index = index.plus(1);
        }

        terms
    }

    #[test]
    fn appends_operations_and_follows_commit_index() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(0), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();

        let output = role
            .handle_backup(
                request(2, Some(1), vec![operation(1, 2), operation(2, 2)]),
                &mut log,
                &mut state,
            )
            .unwrap();

        assert_eq!(output.last_index, Some(Index::new(2)));
        assert_eq!(log.commit_index(), Some(Index::new(1)));
        assert_eq!(state.current_term(), Term::new(2));
        assert_eq!(role.term(), Term::new(2));
        assert_eq!(role.leader(), Some(&MemberId::new("leader")));
        assert_eq!(log.read(Index::new(2)).unwrap().unwrap().value, operation(2, 2).value);

        // Commit index is capped at what the leader vouched for.
        role.handle_backup(request_after(Some((2, 2)), 2, Some(9), vec![]), &mut log, &mut state)
            .unwrap();
        assert_eq!(log.commit_index(), Some(Index::new(2)));
    }

    #[test]
    fn duplicates_are_skipped() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(1), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();

        role.handle_backup(request(1, None, vec![operation(1, 1), operation(2, 1)]), &mut log, &mut state)
            .unwrap();
        let output = role
            .handle_backup(
                request(1, None, vec![operation(1, 1), operation(2, 1), operation(3, 1)]),
                &mut log,
                &mut state,
            )
            .unwrap();

        assert_eq!(output.last_index, Some(Index::new(3)));
        assert_eq!(terms(&log), vec![1, 1, 1]);
    }

    #[test]
    fn conflicting_entries_are_overwritten() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(1), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();

        role.handle_backup(
            request(1, None, vec![operation(1, 1), operation(2, 1), operation(3, 1)]),
            &mut log,
            &mut state,
        )
        .unwrap();
        let output = role
            .handle_backup(request(2, None, vec![operation(2, 2)]), &mut log, &mut state)
            .unwrap();

        assert_eq!(output.last_index, Some(Index::new(2)));
        assert_eq!(terms(&log), vec![1, 2]);
    }

    #[test]
    fn rejects_gaps_and_stale_terms() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(0), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();

        let result = role.handle_backup(request(3, None, vec![operation(1, 3), operation(3, 3)]), &mut log, &mut state);
        assert!(matches!(result, Err(BackupError::IndexGap { next_index }) if next_index == Index::new(2)));
        // What came before the gap is kept.
        assert_eq!(terms(&log), vec![3]);

        let result = role.handle_backup(request(2, None, vec![operation(2, 2)]), &mut log, &mut state);
        assert!(matches!(result, Err(BackupError::StaleTerm { current_term }) if current_term == Term::new(3)));
        assert_eq!(terms(&log), vec![3]);
    }

    #[test]
    fn compacted_operations_are_skipped() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(1), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();

        role.handle_backup(
            request(1, Some(2), vec![operation(1, 1), operation(2, 1)]),
            &mut log,
            &mut state,
        )
        .unwrap();
        log.compact(Index::new(3));

        let output = role
            .handle_backup(
                request(1, None, vec![operation(1, 1), operation(2, 1), operation(3, 1)]),
                &mut log,
                &mut state,
            )
            .unwrap();
        assert_eq!(output.last_index, Some(Index::new(3)));
        assert_eq!(log.first_index(), Index::new(3));
    }

    #[test]
    fn divergent_previous_entry_is_rejected() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(1), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();
        role.handle_backup(request(1, None, vec![operation(1, 1), operation(2, 1)]), &mut log, &mut state)
            .unwrap();

        // New leader's entry 2 is from term 2, ours is from term 1.
        let result = role.handle_backup(
            request_after(Some((2, 2)), 3, Some(3), vec![operation(3, 3)]),
            &mut log,
            &mut state,
        );

        assert!(matches!(result, Err(BackupError::EntryMismatch { index }) if index == Index::new(2)));
        assert_eq!(terms(&log), vec![1]);
        assert_eq!(log.commit_index(), None);
    }

    #[test]
    fn previous_entry_must_exist() {
        let mut role = PassiveRole::new(test_utils::logger(), Term::new(1), None);
        let mut log = new_log();
        let mut state = VolatileLocalState::new();
        role.handle_backup(request(1, None, vec![operation(1, 1)]), &mut log, &mut state)
            .unwrap();

        // Heartbeat from a leader holding more than we do.
        let result = role.handle_backup(request_after(Some((4, 1)), 1, Some(4), vec![]), &mut log, &mut state);
        assert!(matches!(result, Err(BackupError::IndexGap { next_index }) if next_index == Index::new(2)));
        assert_eq!(log.commit_index(), None);

        // Matching previous entry lets operations and commits through.
        let output = role
            .handle_backup(
                request_after(Some((1, 1)), 1, Some(2), vec![operation(2, 1)]),
                &mut log,
                &mut state,
            )
            .unwrap();
        assert_eq!(output.last_index, Some(Index::new(2)));
        assert_eq!(log.commit_index(), Some(Index::new(2)));
    }
}

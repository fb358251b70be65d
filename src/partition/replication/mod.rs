//! Replication strategies decide when a leader's freshly appended entry counts as replicated.
//! Both strategies ship entries to backups the same way, through per-backup queues; they only
//! differ in when the append's future settles.

mod asynchronous;
mod backup_queue;
mod replication_future;
mod synchronous;

use crate::commitlog::Index;
use crate::partition::{BackupReplyFromPeer, BackupTimerTick, Term};
use asynchronous::AsynchronousReplicator;
use bytes::Bytes;
use synchronous::SynchronousReplicator;

pub(crate) use backup_queue::BackupQueues;
pub(crate) use backup_queue::BackupQueuesConfig;
pub(crate) use replication_future::ReplicationFuture;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReplicationStrategy {
    /// An append is acknowledged once enough backups stored it (see [`AckPolicy`]).
    Synchronous,
    /// An append is acknowledged once it is stored locally. Backups catch up in the background.
    Asynchronous,
}

/// How many backups must store an entry before a synchronous append is acknowledged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AckPolicy {
    /// A majority of the partition, counting the leader.
    Majority,
    /// Every backup.
    All,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ReplicationError {
    #[error("Replication was stopped before the entry was replicated")]
    Closed,
    #[error("Need {required} backups to replicate, but only {available} are reachable and up to date")]
    InsufficientBackups { required: usize, available: usize },
}

/// BackupOperation is what a leader ships to a backup for one log entry.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BackupOperation {
    pub(crate) index: Index,
    pub(crate) term: Term,
    pub(crate) timestamp: i64,
    pub(crate) value: Bytes,
}

/// Replicator lives inside a Leader role and only runs on the partition actor.
pub(crate) trait Replicator: Send {
    /// Start replicating an entry that was just appended locally. Entries must be passed in index
    /// order.
    fn replicate(&mut self, operation: BackupOperation) -> ReplicationFuture;

    fn handle_backup_reply(&mut self, reply: BackupReplyFromPeer);

    fn handle_backup_timer(&mut self, tick: BackupTimerTick);

    /// Stop talking to backups. Futures that haven't settled fail with `Closed`.
    fn close(&mut self);
}

pub(crate) fn new_replicator(
    logger: slog::Logger,
    strategy: ReplicationStrategy,
    ack_policy: AckPolicy,
    queues: BackupQueues,
) -> Box<dyn Replicator> {
    match strategy {
        ReplicationStrategy::Synchronous => Box::new(SynchronousReplicator::new(logger, ack_policy, queues)),
        ReplicationStrategy::Asynchronous => Box::new(AsynchronousReplicator::new(queues)),
    }
}

use crate::commitlog::Index;
use crate::partition::replication::replication_future::ReplicationFutureSettler;
use crate::partition::replication::{
    AckPolicy, BackupOperation, BackupQueues, ReplicationError, ReplicationFuture, Replicator,
};
use crate::partition::{BackupReplyFromPeer, BackupTimerTick};
use std::collections::BTreeMap;

/// SynchronousReplicator settles an entry's future once the ack policy is satisfied for it.
/// Futures always settle in index order.
pub(super) struct SynchronousReplicator {
    logger: slog::Logger,
    ack_policy: AckPolicy,
    queues: BackupQueues,
    pending: BTreeMap<Index, ReplicationFutureSettler>,
    closed: bool,
}

impl SynchronousReplicator {
    pub(super) fn new(logger: slog::Logger, ack_policy: AckPolicy, queues: BackupQueues) -> Self {
        SynchronousReplicator {
            logger,
            ack_policy,
            queues,
            pending: BTreeMap::new(),
            closed: false,
        }
    }

    /// Highest index the ack policy considers replicated.
    fn replicated_index(&self) -> Option<Index> {
        let acked = self.queues.acked_indexes();
        match self.ack_policy {
            AckPolicy::Majority => get_cluster_commit_index(acked),
            AckPolicy::All => acked.into_iter().min().flatten(),
        }
    }

    /// Can the ack policy still be satisfied with the backups we're able to ship operations to?
    fn check_feasible(&self) -> Result<(), ReplicationError> {
        let num_backups = self.queues.num_backups();
        let required = match self.ack_policy {
            // Majority of the partition is (n+1)/2+1 members for n backups. Minus me.
            AckPolicy::Majority => (num_backups + 1) / 2,
            AckPolicy::All => num_backups,
        };
        let available = self.queues.num_available();

        if available < required {
            Err(ReplicationError::InsufficientBackups { required, available })
        } else {
            Ok(())
        }
    }

    fn settle_replicated(&mut self) {
        let replicated = match self.replicated_index() {
            Some(index) => index,
            None => return,
        };
        self.queues.set_commit_index(replicated);

        let still_pending = self.pending.split_off(&replicated.plus(1));
        let settled = std::mem::replace(&mut self.pending, still_pending);
        for (_, settler) in settled {
            settler.settle(Ok(()));
        }
    }

    fn fail_pending(&mut self, error: ReplicationError) {
        if !self.pending.is_empty() {
            slog::warn!(
                self.logger,
                "Failing {} pending replications: {}",
                self.pending.len(),
                error
            );
        }
        for (_, settler) in std::mem::take(&mut self.pending) {
            settler.settle(Err(error.clone()));
        }
    }
}

impl Replicator for SynchronousReplicator {
    fn replicate(&mut self, operation: BackupOperation) -> ReplicationFuture {
        if self.closed {
            return ReplicationFuture::ready(Err(ReplicationError::Closed));
        }
        if self.queues.is_empty() {
            // No backups, nobody to wait for.
            self.queues.set_commit_index(operation.index);
            return ReplicationFuture::ready(Ok(()));
        }
        if let Err(e) = self.check_feasible() {
            return ReplicationFuture::ready(Err(e));
        }

        let index = operation.index;
        self.queues.enqueue(operation);

        let (settler, future) = ReplicationFuture::waiting();
        self.pending.insert(index, settler);

        future
    }

    fn handle_backup_reply(&mut self, reply: BackupReplyFromPeer) {
        self.queues.handle_reply(reply);
        self.settle_replicated();
        if let Err(e) = self.check_feasible() {
            self.fail_pending(e);
        }
    }

    fn handle_backup_timer(&mut self, tick: BackupTimerTick) {
        self.queues.handle_timer(tick);
    }

    fn close(&mut self) {
        self.closed = true;
        self.queues.close();
        self.fail_pending(ReplicationError::Closed);
    }
}

/// Highest index stored on a majority of the partition, given what each backup acknowledged.
fn get_cluster_commit_index(mut peers_acked_indexes: Vec<Option<Index>>) -> Option<Index> {
    peers_acked_indexes.sort_by_key(|acked| match acked {
        None => 0u64,
        Some(a) => a.as_u64(),
    });

    // Overview of why algo is correct:
    // We are always at the tail of the array, because our log is same/longest.
    // 1. add "me"
    //let cluster_size = peers_acked_indexes.len() + 1;
    // 2. calculate majority
    //let majority = (cluster_size / 2) + 1;
    // 3. subtract "me"
    //let num_peers_to_achieve_majority = majority - 1;
    // 4. take `i`th index from the right
    //let quorum_idx = peers_acked_indexes.len() - num_peers_to_achieve_majority;

    // Or just use this simplified equation which is harder to understand at a glance why it
    // works. When in doubt, just read the unit tests.
    let quorum_idx = peers_acked_indexes.len() / 2;

    peers_acked_indexes.remove(quorum_idx)
}

use crate::partition::replication::{BackupOperation, BackupQueues, ReplicationError, ReplicationFuture, Replicator};
use crate::partition::{BackupReplyFromPeer, BackupTimerTick};

/// AsynchronousReplicator acknowledges an entry as soon as it's stored locally. The backup queues
/// ship it in the background, and the entry counts as committed right away.
pub(super) struct AsynchronousReplicator {
    queues: BackupQueues,
    closed: bool,
}

impl AsynchronousReplicator {
    pub(super) fn new(queues: BackupQueues) -> Self {
        AsynchronousReplicator { queues, closed: false }
    }
}

impl Replicator for AsynchronousReplicator {
    fn replicate(&mut self, operation: BackupOperation) -> ReplicationFuture {
        if self.closed {
            return ReplicationFuture::ready(Err(ReplicationError::Closed));
        }

        self.queues.set_commit_index(operation.index);
        self.queues.enqueue(operation);

        ReplicationFuture::ready(Ok(()))
    }

    fn handle_backup_reply(&mut self, reply: BackupReplyFromPeer) {
        self.queues.handle_reply(reply);
    }

    fn handle_backup_timer(&mut self, tick: BackupTimerTick) {
        self.queues.handle_timer(tick);
    }

    fn close(&mut self) {
        self.closed = true;
        self.queues.close();
    }
}

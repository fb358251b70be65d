use crate::actor::WeakActorClient;
use crate::commitlog::Index;
use crate::partition::replication::BackupOperation;
use crate::partition::timers::BackupTimerHandle;
use crate::partition::{
    BackupInput, BackupReplyDescriptor, BackupReplyFromPeer, BackupReplyFromPeerError, BackupTimerTick, MemberId,
    Term,
};
use crate::transport::Transport;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::time::Duration;

pub(crate) struct BackupQueuesConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) my_member_id: MemberId,
    pub(crate) term: Term,
    pub(crate) peer_ids: Vec<MemberId>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) actor_client: WeakActorClient,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) rpc_timeout: Duration,
    pub(crate) max_batch_size: usize,
    pub(crate) commit_index: Option<Index>,
    // Latest entry in the leader's log when the queues start.
    pub(crate) last_entry: Option<(Index, Term)>,
}

/// BackupQueues ships a leader's operations to every backup of the partition. Each backup has its
/// own FIFO of operations it hasn't acknowledged yet.
pub(crate) struct BackupQueues {
    logger: slog::Logger,
    my_member_id: MemberId,
    term: Term,
    transport: Arc<dyn Transport>,
    actor_client: WeakActorClient,
    rpc_timeout: Duration,
    max_batch_size: usize,
    // Sent along with every request so backups learn what's committed.
    commit_index: Option<Index>,
    queues: BTreeMap<MemberId, BackupQueue>,
}

struct BackupQueue {
    // Held to send heartbeats to this backup
    timer: BackupTimerHandle,

    // Operations not yet acknowledged by the backup, in index order.
    pending: VecDeque<BackupOperation>,
    // Entry right before `pending`. The backup checks it holds the same one before storing.
    previous: Option<(Index, Term)>,
    // Highest index the backup acknowledged storing in this term.
    acked: Option<Index>,
    // A lagging backup is missing entries that aren't in `pending` anymore (or never were), so
    // it can't be caught up from here. It gets heartbeats only.
    lagging: bool,

    // SeqNo is a form of a logical clock that tracks this leader's interactions with one backup.
    // Each request gets the next SeqNo and the reply carries it back. Replies from before a
    // previously received SeqNo are discarded.
    last_sent_seq_no: u64,
    last_received_seq_no: u64,
}

impl BackupQueues {
    pub(crate) fn new(config: BackupQueuesConfig) -> Self {
        let mut queues = BTreeMap::new();
        for peer_id in config.peer_ids {
            let timer = BackupTimerHandle::spawn_timer_task(
                config.heartbeat_interval,
                config.actor_client.clone(),
                peer_id.clone(),
                config.term,
            );
            queues.insert(
                peer_id,
                BackupQueue {
                    timer,
                    pending: VecDeque::new(),
                    previous: config.last_entry,
                    acked: None,
                    lagging: false,
                    last_sent_seq_no: 0,
                    last_received_seq_no: 0,
                },
            );
        }

        BackupQueues {
            logger: config.logger,
            my_member_id: config.my_member_id,
            term: config.term,
            transport: config.transport,
            actor_client: config.actor_client,
            rpc_timeout: config.rpc_timeout,
            max_batch_size: config.max_batch_size,
            commit_index: config.commit_index,
            queues,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub(crate) fn num_backups(&self) -> usize {
        self.queues.len()
    }

    /// Backups that are still receiving operations.
    pub(crate) fn num_available(&self) -> usize {
        self.queues.values().filter(|queue| !queue.lagging).count()
    }

    /// Acknowledged index of every backup, lagging ones included.
    pub(crate) fn acked_indexes(&self) -> Vec<Option<Index>> {
        self.queues.values().map(|queue| queue.acked).collect()
    }

    pub(crate) fn set_commit_index(&mut self, commit_index: Index) {
        if self.commit_index.map_or(true, |ci| ci < commit_index) {
            self.commit_index.replace(commit_index);
        }
    }

    pub(crate) fn enqueue(&mut self, operation: BackupOperation) {
        let peer_ids: Vec<_> = self.queues.keys().cloned().collect();
        for peer_id in peer_ids.iter() {
            if let Some(queue) = self.queues.get_mut(peer_id) {
                if !queue.lagging {
                    queue.pending.push_back(operation.clone());
                }
            }
            self.send_batch(peer_id, false);
        }
    }

    pub(crate) fn handle_timer(&mut self, tick: BackupTimerTick) {
        if tick.term != self.term {
            slog::warn!(
                self.logger,
                "Received backup timer tick for outdated term {:?}, current term: {:?}",
                tick.term,
                self.term
            );
            return;
        }

        self.send_batch(&tick.peer_id, true);
    }

    pub(crate) fn handle_reply(&mut self, reply: BackupReplyFromPeer) {
        let logger = self.logger.new(slog::o!(
            "Peer" => format!("{:?}", reply.descriptor.peer_id),
            "SeqNo" => reply.descriptor.seq_no,
        ));
        slog::debug!(logger, "Backup reply from peer result: {:?}", reply.result);

        if reply.descriptor.term != self.term {
            slog::info!(
                logger,
                "Received backup reply for outdated term {:?}, but we're on term {:?}",
                reply.descriptor.term,
                self.term
            );
            return;
        }

        let queue = match self.queues.get_mut(&reply.descriptor.peer_id) {
            Some(queue) => queue,
            None => {
                slog::warn!(logger, "Received backup reply from unknown peer");
                return;
            }
        };
        if !queue.ratchet_fwd_received_seq_no(reply.descriptor.seq_no) {
            slog::warn!(logger, "Dropping out of date seq-no: {:?}", reply.result);
            return;
        }

        match reply.result {
            Ok(_) => {
                if let Some(last_index_sent) = reply.descriptor.last_index_sent {
                    queue.ack(last_index_sent);
                }
                if !queue.pending.is_empty() {
                    self.send_batch(&reply.descriptor.peer_id, false);
                }
            }
            Err(BackupReplyFromPeerError::StaleTerm { current_term }) => {
                slog::warn!(
                    logger,
                    "Backup is on term {:?}, our term {:?} is stale. Not sending it operations anymore.",
                    current_term,
                    self.term
                );
                queue.mark_lagging();
            }
            Err(BackupReplyFromPeerError::IndexGap { next_index }) => {
                slog::warn!(
                    logger,
                    "Backup is missing entries before {:?}. Not sending it operations anymore.",
                    next_index
                );
                queue.mark_lagging();
            }
            Err(BackupReplyFromPeerError::EntryMismatch { index }) => {
                slog::warn!(
                    logger,
                    "Backup's entry {:?} differs from ours. Not sending it operations anymore.",
                    index
                );
                queue.mark_lagging();
            }
            Err(BackupReplyFromPeerError::NotBackup) => {
                slog::warn!(logger, "Peer doesn't think it's a backup. Will retry.");
                queue.timer.delay_after_failure();
            }
            Err(BackupReplyFromPeerError::RetryableFailure(err_msg)) => {
                slog::warn!(logger, "Backup failure: {:?}", err_msg);
                queue.timer.delay_after_failure();
            }
        }
    }

    /// Stops all heartbeats. Replies still in flight are dropped by the role that owned us.
    pub(crate) fn close(&mut self) {
        self.queues.clear();
    }

    // Simplicity vs throughput tradeoff. We're just going to allow 1 outstanding request per
    // backup; no pipelining. Operations that pile up meanwhile go out in the next batch.
    fn send_batch(&mut self, peer_id: &MemberId, is_heartbeat: bool) {
        let queue = match self.queues.get_mut(peer_id) {
            Some(queue) => queue,
            None => {
                slog::error!(self.logger, "Missing backup queue for peer {:?}", peer_id);
                return;
            }
        };
        if queue.has_outstanding_request() {
            return;
        }
        if queue.pending.is_empty() && !is_heartbeat {
            return;
        }

        let operations: Vec<_> = queue.pending.iter().take(self.max_batch_size).cloned().collect();
        let descriptor = BackupReplyDescriptor {
            peer_id: peer_id.clone(),
            term: self.term,
            seq_no: queue.next_seq_no(),
            last_index_sent: operations.last().map(|operation| operation.index),
            num_operations: operations.len(),
        };
        let request = BackupInput {
            leader_id: self.my_member_id.clone(),
            term: self.term,
            commit_index: self.commit_index,
            operations,
            prev_entry: queue.previous,
        };

        tokio::task::spawn(Self::call_backup(
            self.logger.clone(),
            self.transport.clone(),
            request,
            self.rpc_timeout,
            self.actor_client.clone(),
            descriptor,
        ));

        queue.timer.reset_heartbeat_timer();
    }

    async fn call_backup(
        logger: slog::Logger,
        transport: Arc<dyn Transport>,
        request: BackupInput,
        rpc_timeout: Duration,
        callback: WeakActorClient,
        descriptor: BackupReplyDescriptor,
    ) {
        slog::debug!(
            logger,
            "Sending {} operations to {:?} (seq-no {})",
            descriptor.num_operations,
            descriptor.peer_id,
            descriptor.seq_no
        );
        let result = match tokio::time::timeout(rpc_timeout, transport.backup(&descriptor.peer_id, request)).await {
            Ok(result) => result,
            Err(_timeout) => Err(BackupReplyFromPeerError::RetryableFailure(
                "Timed out calling Backup".into(),
            )),
        };

        let _ = callback
            .backup_reply_from_peer(BackupReplyFromPeer { descriptor, result })
            .await;
    }
}

impl BackupQueue {
    fn ack(&mut self, last_index_sent: Index) {
        while matches!(self.pending.front(), Some(operation) if operation.index <= last_index_sent) {
            if let Some(operation) = self.pending.pop_front() {
                self.previous.replace((operation.index, operation.term));
            }
        }
        if self.acked.map_or(true, |acked| acked < last_index_sent) {
            self.acked.replace(last_index_sent);
        }
    }

    fn mark_lagging(&mut self) {
        self.lagging = true;
        self.pending.clear();
    }

    fn has_outstanding_request(&self) -> bool {
        self.last_received_seq_no < self.last_sent_seq_no
    }

    fn next_seq_no(&mut self) -> u64 {
        self.last_sent_seq_no += 1;
        self.last_sent_seq_no
    }

    /// returns true if the state was mutated.
    fn ratchet_fwd_received_seq_no(&mut self, received_seq_no: u64) -> bool {
        if self.last_received_seq_no < received_seq_no && received_seq_no <= self.last_sent_seq_no {
            self.last_received_seq_no = received_seq_no;
            true
        } else {
            false
        }
    }
}

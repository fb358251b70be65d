use crate::actor::{Callback, WeakActorClient};
use crate::commitlog::{Index, Log};
use crate::partition::consumer::{ConsumerKey, Consumers};
use crate::partition::log::PartitionLog;
use crate::partition::replication::{self, BackupQueues, BackupQueuesConfig, Replicator};
use crate::partition::timers::SessionExpiryTimerHandle;
use crate::partition::{
    AppendError, AppendInput, AppendOutput, BackupOperation, BackupReplyFromPeer, BackupTimerTick, ConsumeInput,
    DrainConsumerTick, LogEntry, MemberId, PartitionSettings, ReplicationComplete, ReplicationError, ResetInput, Term,
};
use crate::session::SessionRegistry;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::time::Instant;

pub(crate) struct LeaderConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) my_member_id: MemberId,
    pub(crate) peer_ids: Vec<MemberId>,
    pub(crate) term: Term,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) actor_client: WeakActorClient,
    pub(crate) sessions: SessionRegistry,
    pub(crate) settings: PartitionSettings,
}

/// LeaderRole owns everything that only exists while we lead: the replicator with its backup
/// queues, open consumers, and the session expiry timer. Dropping it stops all of them.
pub(crate) struct LeaderRole {
    logger: slog::Logger,
    term: Term,
    actor_client: WeakActorClient,
    replicator: Box<dyn Replicator>,
    consumers: Consumers,
    _session_expiry_timer: SessionExpiryTimerHandle,
}

impl LeaderRole {
    pub(crate) fn new<L: Log<LogEntry>>(config: LeaderConfig, log: &mut PartitionLog<L>) -> Self {
        // Whatever made it into our log is committed from here on.
        log.commit_all();
        // Sessions shouldn't pay for the time it took to fail over.
        config.sessions.touch_all(Instant::now());

        let queues = BackupQueues::new(BackupQueuesConfig {
            logger: config.logger.clone(),
            my_member_id: config.my_member_id,
            term: config.term,
            peer_ids: config.peer_ids,
            transport: config.transport.clone(),
            actor_client: config.actor_client.clone(),
            heartbeat_interval: config.settings.backup_heartbeat_interval,
            rpc_timeout: config.settings.backup_rpc_timeout,
            max_batch_size: config.settings.max_backup_batch_size,
            commit_index: log.commit_index(),
            last_entry: log.latest_entry().map(|(term, index)| (index, term)),
        });
        let replicator = replication::new_replicator(
            config.logger.clone(),
            config.settings.replication_strategy,
            config.settings.ack_policy,
            queues,
        );
        let consumers = Consumers::new(
            config.logger.clone(),
            config.term,
            config.transport,
            config.actor_client.clone(),
            config.settings.max_records_per_drain,
        );
        let session_expiry_timer = SessionExpiryTimerHandle::spawn_timer_task(
            config.logger.clone(),
            config.sessions,
            config.settings.session_check_interval,
        );

        LeaderRole {
            logger: config.logger,
            term: config.term,
            actor_client: config.actor_client,
            replicator,
            consumers,
            _session_expiry_timer: session_expiry_timer,
        }
    }

    pub(crate) fn term(&self) -> Term {
        self.term
    }

    /// Append locally, then replicate. The callback is answered once replication settles, which
    /// may be right away or after a `ReplicationComplete` event comes back.
    pub(crate) fn append<L: Log<LogEntry>>(
        &mut self,
        input: AppendInput,
        callback: Callback<AppendOutput, AppendError>,
        log: &mut PartitionLog<L>,
    ) {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let entry = LogEntry {
            term: self.term,
            timestamp,
            value: input.value.clone(),
        };
        let index = match log.append(entry) {
            Ok(index) => index,
            Err(e) => {
                slog::warn!(self.logger, "Failed to append to local log: {:?}", e);
                callback.send(Err(AppendError::LocalIoError(e)));
                return;
            }
        };

        let mut future = self.replicator.replicate(BackupOperation {
            index,
            term: self.term,
            timestamp,
            value: input.value,
        });
        if let Some(result) = future.take_ready() {
            self.complete_append(self.term, index, result, callback, log);
            return;
        }

        let term = self.term;
        let actor_client = self.actor_client.clone();
        tokio::task::spawn(async move {
            let result = future.await;
            let _ = actor_client
                .replication_complete(ReplicationComplete {
                    term,
                    index,
                    result,
                    callback,
                })
                .await;
        });
    }

    pub(crate) fn handle_replication_complete<L: Log<LogEntry>>(
        &mut self,
        complete: ReplicationComplete,
        log: &mut PartitionLog<L>,
    ) {
        self.complete_append(complete.term, complete.index, complete.result, complete.callback, log);
    }

    fn complete_append<L: Log<LogEntry>>(
        &mut self,
        term: Term,
        index: Index,
        result: Result<(), ReplicationError>,
        callback: Callback<AppendOutput, AppendError>,
        log: &mut PartitionLog<L>,
    ) {
        match result {
            Ok(()) => {
                if term == self.term && log.ratchet_fwd_commit_index(index) {
                    self.consumers.notify_all(log);
                }
                callback.send(Ok(AppendOutput { term, index }));
            }
            Err(e) => {
                // The entry stays in our log.
                slog::warn!(self.logger, "Failed to replicate {:?}: {}", index, e);
                callback.send(Err(AppendError::Replication(e)));
            }
        }
    }

    pub(crate) fn consume<L: Log<LogEntry>>(&mut self, input: ConsumeInput, log: &PartitionLog<L>) {
        let key = ConsumerKey {
            member_id: input.member_id,
            subject: input.subject,
        };
        self.consumers
            .open(key, input.index.unwrap_or_else(Index::start_index), log);
    }

    pub(crate) fn reset<L: Log<LogEntry>>(&mut self, input: ResetInput, log: &PartitionLog<L>) {
        let key = ConsumerKey {
            member_id: input.member_id,
            subject: input.subject,
        };
        self.consumers
            .reset(&key, input.index.unwrap_or_else(Index::start_index), log);
    }

    pub(crate) fn handle_backup_reply(&mut self, reply: BackupReplyFromPeer) {
        self.replicator.handle_backup_reply(reply);
    }

    pub(crate) fn handle_backup_timer(&mut self, tick: BackupTimerTick) {
        self.replicator.handle_backup_timer(tick);
    }

    pub(crate) fn handle_drain_tick<L: Log<LogEntry>>(&mut self, tick: DrainConsumerTick, log: &PartitionLog<L>) {
        self.consumers.handle_drain_tick(tick, log);
    }

    /// Replication stops first, so no commit can wake a consumer that's being closed.
    pub(crate) fn close(&mut self) {
        self.replicator.close();
        self.consumers.close_all();
    }
}

use crate::actor::{Callback, WeakActorClient};
use crate::commitlog::{Index, Log};
use crate::partition::log::PartitionLog;
use crate::partition::role::{
    self, CandidateRole, LeaderConfig, LeaderRole, PassiveRole, Role, RoleChangeListener, RoleChangeNotifier,
    RoleSnapshot,
};
use crate::partition::{
    AckPolicy, AppendError, AppendInput, AppendOutput, BackupError, BackupInput, BackupOutput, BackupReplyFromPeer,
    BackupTimerTick, ConsumeError, ConsumeInput, DrainConsumerTick, LeaderRedirectInfo, LogEntry, Members,
    PersistentLocalState, Protocol, ReplicationComplete, ReplicationStrategy, ResetError, ResetInput, RoleTransition,
    SessionError, Term, TransitionError,
};
use crate::server::RpcServerShutdownHandle;
use crate::session::{OpenSessionRequest, Session, SessionId, SessionRegistry};
use crate::transport::Transport;
use std::io;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// PartitionSettings are the tunables of a partition that roles are built from.
#[derive(Clone, Debug)]
pub(crate) struct PartitionSettings {
    pub(crate) replication_strategy: ReplicationStrategy,
    pub(crate) ack_policy: AckPolicy,
    pub(crate) backup_heartbeat_interval: Duration,
    pub(crate) backup_rpc_timeout: Duration,
    pub(crate) max_backup_batch_size: usize,
    pub(crate) max_records_per_drain: usize,
    pub(crate) session_check_interval: Duration,
}

pub(crate) struct PartitionConfig<L: Log<LogEntry>> {
    pub(crate) logger: slog::Logger,
    pub(crate) members: Members,
    pub(crate) protocol: Protocol,
    pub(crate) log: L,
    pub(crate) local_state: Box<dyn PersistentLocalState + Send>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) actor_client: WeakActorClient,
    pub(crate) settings: PartitionSettings,
    // Dropped on close, which stops the peer server.
    pub(crate) server_shutdown: Option<RpcServerShutdownHandle>,
}

/// Partition is the role controller. It owns the log and the current role, and answers every
/// request according to that role. It's driven by the partition actor, one event at a time.
pub(crate) struct Partition<L: Log<LogEntry>> {
    logger: slog::Logger,
    members: Members,
    protocol: Protocol,
    log: PartitionLog<L>,
    local_state: Box<dyn PersistentLocalState + Send>,
    sessions: SessionRegistry,
    transport: Arc<dyn Transport>,
    actor_client: WeakActorClient,
    settings: PartitionSettings,
    server_shutdown: Option<RpcServerShutdownHandle>,

    role: Role,
    role_notifier: RoleChangeNotifier,
    // Last session id handed out by this member as leader.
    last_session_id: u64,
}

impl<L: Log<LogEntry>> Partition<L> {
    pub(crate) fn new(config: PartitionConfig<L>) -> Result<(Self, RoleChangeListener), io::Error> {
        let log = PartitionLog::new(config.logger.clone(), config.log)?;
        let term = config.local_state.current_term();
        let role = match config.protocol {
            Protocol::Consensus => Role::Follower(PassiveRole::new(config.logger.clone(), term, None)),
            Protocol::PrimaryBackup => Role::Backup(PassiveRole::new(config.logger.clone(), term, None)),
        };
        let (role_notifier, listener) = role::new_role_change_channel(role.snapshot());

        let partition = Partition {
            logger: config.logger,
            members: config.members,
            protocol: config.protocol,
            log,
            local_state: config.local_state,
            sessions: config.sessions,
            transport: config.transport,
            actor_client: config.actor_client,
            settings: config.settings,
            server_shutdown: config.server_shutdown,
            role,
            role_notifier,
            last_session_id: 0,
        };

        Ok((partition, listener))
    }

    pub(crate) fn handle_append(&mut self, input: AppendInput, callback: Callback<AppendOutput, AppendError>) {
        match &mut self.role {
            Role::Leader(leader) => leader.append(input, callback, &mut self.log),
            _ => callback.send(Err(AppendError::NotLeader(self.leader_redirect()))),
        }
    }

    pub(crate) fn handle_consume(&mut self, input: ConsumeInput) -> Result<(), ConsumeError> {
        match &mut self.role {
            Role::Leader(leader) => {
                leader.consume(input, &self.log);
                Ok(())
            }
            _ => Err(ConsumeError::NotLeader(self.leader_redirect())),
        }
    }

    pub(crate) fn handle_reset(&mut self, input: ResetInput) -> Result<(), ResetError> {
        match &mut self.role {
            Role::Leader(leader) => {
                leader.reset(input, &self.log);
                Ok(())
            }
            _ => Err(ResetError::NotLeader(self.leader_redirect())),
        }
    }

    pub(crate) fn handle_open_session(&mut self, input: OpenSessionRequest) -> Result<Session, SessionError> {
        let validated = input.validate()?;
        self.check_leader_for_session()?;

        // A new leader continues after whatever ids the previous one handed out.
        let previous_max = self.sessions.max_id().map(|id| id.as_u64()).unwrap_or(0);
        self.last_session_id = std::cmp::max(self.last_session_id, previous_max) + 1;
        let session = validated.into_session(SessionId::new(self.last_session_id));

        let registered = self.sessions.register(session, Instant::now());
        slog::info!(self.logger, "Opened session {:?}", registered);

        Ok(registered.as_ref().clone())
    }

    pub(crate) fn handle_close_session(&mut self, session_id: SessionId) -> Result<bool, SessionError> {
        self.check_leader_for_session()?;

        let removed = self.sessions.unregister(session_id);
        if removed {
            slog::info!(self.logger, "Closed session {:?}", session_id);
        } else {
            slog::debug!(self.logger, "Close for unknown session {:?}", session_id);
        }

        Ok(removed)
    }

    pub(crate) fn handle_keep_alive(&mut self, session_id: SessionId) -> Result<bool, SessionError> {
        self.check_leader_for_session()?;

        Ok(self.sessions.keep_alive(session_id, Instant::now()))
    }

    pub(crate) fn handle_backup(&mut self, input: BackupInput) -> Result<BackupOutput, BackupError> {
        let before = self.role.snapshot();
        let result = match &mut self.role {
            Role::Follower(passive) | Role::Backup(passive) => {
                passive.handle_backup(input, &mut self.log, self.local_state.as_mut())
            }
            Role::Leader(_) | Role::Candidate(_) | Role::Closed => Err(BackupError::NotBackup),
        };

        let after = self.role.snapshot();
        if before != after {
            slog::info!(self.logger, "Role changed by leader contact: {:?}", after);
            self.role_notifier.notify_new_role(after);
        }

        result
    }

    pub(crate) fn handle_backup_reply_from_peer(&mut self, reply: BackupReplyFromPeer) {
        match &mut self.role {
            Role::Leader(leader) => leader.handle_backup_reply(reply),
            _ => slog::debug!(self.logger, "Not leader anymore, dropping backup reply {:?}", reply.descriptor),
        }
    }

    pub(crate) fn handle_backup_timer(&mut self, tick: BackupTimerTick) {
        if let Role::Leader(leader) = &mut self.role {
            leader.handle_backup_timer(tick);
        }
    }

    pub(crate) fn handle_replication_complete(&mut self, complete: ReplicationComplete) {
        match &mut self.role {
            Role::Leader(leader) => leader.handle_replication_complete(complete, &mut self.log),
            _ => {
                // We stepped down meanwhile. Answer the writer, but don't commit anything.
                let ReplicationComplete {
                    term,
                    index,
                    result,
                    callback,
                } = complete;
                callback.send(
                    result
                        .map(|_| AppendOutput { term, index })
                        .map_err(AppendError::Replication),
                );
            }
        }
    }

    pub(crate) fn handle_drain_consumer(&mut self, tick: DrainConsumerTick) {
        if let Role::Leader(leader) = &mut self.role {
            leader.handle_drain_tick(tick, &self.log);
        }
    }

    pub(crate) fn handle_compact(&mut self, index: Index) -> Index {
        self.log.compact(index)
    }

    pub(crate) fn handle_transition(&mut self, transition: RoleTransition) -> Result<(), TransitionError> {
        if !transition.is_allowed_for(self.protocol) {
            return Err(TransitionError::WrongProtocol {
                protocol: self.protocol,
                requested: transition.name(),
            });
        }

        let current_term = self.local_state.current_term();
        let new_term = transition.term();
        if new_term < current_term {
            return Err(TransitionError::StaleTerm { current_term });
        }

        match &transition {
            RoleTransition::Follower {
                leader: Some(leader), ..
            }
            | RoleTransition::Backup {
                leader: Some(leader), ..
            } if !self.members.contains(leader) => {
                return Err(TransitionError::UnknownLeader(leader.clone()));
            }
            _ => {}
        }
        // Replies and ticks for the running leader carry only its term. A second leader of the
        // same term would accept them as its own.
        if let (Role::Leader(leader), RoleTransition::Leader { term }) = (&self.role, &transition) {
            if leader.term() == *term {
                return Err(TransitionError::AlreadyLeader { term: *term });
            }
        }

        self.local_state.store_term_if_increased(new_term);

        // Old role is fully torn down before the new one exists.
        let mut old_role = std::mem::replace(&mut self.role, Role::Closed);
        old_role.close();
        drop(old_role);

        self.role = match transition {
            RoleTransition::Leader { term } => Role::Leader(self.new_leader_role(term)),
            RoleTransition::Candidate { term } => Role::Candidate(CandidateRole::new(term)),
            RoleTransition::Follower { term, leader } => {
                Role::Follower(PassiveRole::new(self.logger.clone(), term, leader))
            }
            RoleTransition::Backup { term, leader } => Role::Backup(PassiveRole::new(self.logger.clone(), term, leader)),
        };

        let snapshot = self.role.snapshot();
        slog::info!(self.logger, "Transitioned to {:?}", snapshot);
        self.role_notifier.notify_new_role(snapshot);

        Ok(())
    }

    pub(crate) fn handle_close(&mut self) {
        self.role.close();
        self.role = Role::Closed;
        self.sessions.clear();
        self.server_shutdown.take();

        slog::info!(self.logger, "Partition closed");
        self.role_notifier.notify_new_role(RoleSnapshot::Closed);
    }

    fn new_leader_role(&mut self, term: Term) -> LeaderRole {
        LeaderRole::new(
            LeaderConfig {
                logger: self.logger.clone(),
                my_member_id: self.members.my_member_id().clone(),
                peer_ids: self.members.peer_ids(),
                term,
                transport: self.transport.clone(),
                actor_client: self.actor_client.clone(),
                sessions: self.sessions.clone(),
                settings: self.settings.clone(),
            },
            &mut self.log,
        )
    }

    fn leader_redirect(&self) -> Option<LeaderRedirectInfo> {
        self.role
            .known_leader()
            .and_then(|leader_id| self.members.redirect_info(leader_id))
    }

    fn check_leader_for_session(&self) -> Result<(), SessionError> {
        match &self.role {
            Role::Leader(_) => Ok(()),
            _ => Err(SessionError::NotLeader(self.leader_redirect())),
        }
    }
}

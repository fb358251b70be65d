use crate::actor::{ActorExited, Callback};
use crate::commitlog::Index;
use crate::partition::consumer::ConsumerKey;
use crate::partition::members::{LeaderRedirectInfo, MemberId};
use crate::partition::replication::{BackupOperation, ReplicationError};
use crate::partition::{Protocol, Term};
use crate::session::SessionValidationError;
use bytes::Bytes;
use std::io;

#[derive(Debug)]
pub(crate) struct AppendInput {
    pub(crate) value: Bytes,
}

#[derive(Debug)]
pub(crate) struct AppendOutput {
    pub(crate) term: Term,
    pub(crate) index: Index,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AppendError {
    #[error("I'm not leader")]
    NotLeader(Option<LeaderRedirectInfo>),

    #[error("Failed to persist log entry")]
    LocalIoError(io::Error),

    // The entry stays in the local log.
    #[error("Failed to replicate log entry: {0}")]
    Replication(ReplicationError),

    #[error("Partition actor has exited")]
    ActorExited,
}

#[derive(Debug)]
pub(crate) struct ConsumeInput {
    pub(crate) member_id: MemberId,
    pub(crate) subject: String,
    // None means "from the start of the log".
    pub(crate) index: Option<Index>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConsumeError {
    #[error("I'm not leader")]
    NotLeader(Option<LeaderRedirectInfo>),

    #[error("Partition actor has exited")]
    ActorExited,
}

#[derive(Debug)]
pub(crate) struct ResetInput {
    pub(crate) member_id: MemberId,
    pub(crate) subject: String,
    pub(crate) index: Option<Index>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ResetError {
    #[error("I'm not leader")]
    NotLeader(Option<LeaderRedirectInfo>),

    #[error("Partition actor has exited")]
    ActorExited,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionError {
    #[error("Invalid open session request: {0}")]
    Validation(SessionValidationError),

    #[error("I'm not leader")]
    NotLeader(Option<LeaderRedirectInfo>),

    #[error("Partition actor has exited")]
    ActorExited,
}

#[derive(Debug)]
pub(crate) struct BackupInput {
    pub(crate) leader_id: MemberId,
    pub(crate) term: Term,
    pub(crate) commit_index: Option<Index>,
    pub(crate) operations: Vec<BackupOperation>,
    // The leader's entry right before the first operation (or its last entry, for a heartbeat).
    // The backup must hold the same entry to accept anything.
    pub(crate) prev_entry: Option<(Index, Term)>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BackupOutput {
    // Highest index in the backup's log after applying the request.
    pub(crate) last_index: Option<Index>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum BackupError {
    #[error("Leader's term is out of date")]
    StaleTerm { current_term: Term },

    #[error("Operations skip ahead of our log, next index is {next_index:?}")]
    IndexGap { next_index: Index },

    #[error("Our entry at {index:?} differs from the leader's")]
    EntryMismatch { index: Index },

    #[error("I'm not a backup")]
    NotBackup,

    #[error("We (server) had an IO failure: {0:?}")]
    LocalIoError(io::Error),

    #[error("Partition actor has exited")]
    ActorExited,
}

/// BackupTimerTick contains info for a single tick of a leader's per-backup timer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BackupTimerTick {
    pub(crate) peer_id: MemberId,
    pub(crate) term: Term,
}

#[derive(Debug)]
pub(crate) struct BackupReplyFromPeer {
    pub(crate) descriptor: BackupReplyDescriptor,
    pub(crate) result: Result<BackupOutput, BackupReplyFromPeerError>,
}

// What was sent, so the reply can be matched up with it.
#[derive(Debug)]
pub(crate) struct BackupReplyDescriptor {
    pub(crate) peer_id: MemberId,
    pub(crate) term: Term,
    pub(crate) seq_no: u64,
    pub(crate) last_index_sent: Option<Index>,
    pub(crate) num_operations: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BackupReplyFromPeerError {
    StaleTerm { current_term: Term },
    IndexGap { next_index: Index },
    EntryMismatch { index: Index },
    NotBackup,
    RetryableFailure(String),
}

/// ReplicationComplete re-enters the actor once the replication strategy settled an append.
#[derive(Debug)]
pub(crate) struct ReplicationComplete {
    pub(crate) term: Term,
    pub(crate) index: Index,
    pub(crate) result: Result<(), ReplicationError>,
    pub(crate) callback: Callback<AppendOutput, AppendError>,
}

/// DrainConsumerTick is a scheduled continuation of a consumer's drain loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DrainConsumerTick {
    pub(crate) term: Term,
    pub(crate) key: ConsumerKey,
    pub(crate) consumer_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RoleTransition {
    Leader { term: Term },
    Follower { term: Term, leader: Option<MemberId> },
    Candidate { term: Term },
    Backup { term: Term, leader: Option<MemberId> },
}

impl RoleTransition {
    pub(crate) fn term(&self) -> Term {
        match self {
            RoleTransition::Leader { term }
            | RoleTransition::Follower { term, .. }
            | RoleTransition::Candidate { term }
            | RoleTransition::Backup { term, .. } => *term,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            RoleTransition::Leader { .. } => "Leader",
            RoleTransition::Follower { .. } => "Follower",
            RoleTransition::Candidate { .. } => "Candidate",
            RoleTransition::Backup { .. } => "Backup",
        }
    }

    pub(crate) fn is_allowed_for(&self, protocol: Protocol) -> bool {
        match (protocol, self) {
            (_, RoleTransition::Leader { .. }) => true,
            (Protocol::Consensus, RoleTransition::Follower { .. }) => true,
            (Protocol::Consensus, RoleTransition::Candidate { .. }) => true,
            (Protocol::PrimaryBackup, RoleTransition::Backup { .. }) => true,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum TransitionError {
    #[error("{requested} role is not part of the {protocol:?} protocol")]
    WrongProtocol {
        protocol: Protocol,
        requested: &'static str,
    },

    #[error("Requested term is out of date, current term is {current_term:?}")]
    StaleTerm { current_term: Term },

    #[error("Leader {0:?} is not a member of this partition")]
    UnknownLeader(MemberId),

    #[error("Already leader for term {term:?}")]
    AlreadyLeader { term: Term },

    #[error("Partition actor has exited")]
    ActorExited,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    pub(crate) index: Index,
    pub(crate) timestamp: i64,
    pub(crate) value: Bytes,
}

/// RecordsRequest is pushed to a subscriber, one record at a time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordsRequest {
    pub(crate) record: Record,
    // True if the subscriber should not assume this record follows the previous one it received.
    pub(crate) reset: bool,
}

// ------- Conversions --------

impl From<ActorExited> for AppendError {
    fn from(_: ActorExited) -> Self {
        AppendError::ActorExited
    }
}

impl From<ActorExited> for ConsumeError {
    fn from(_: ActorExited) -> Self {
        ConsumeError::ActorExited
    }
}

impl From<ActorExited> for ResetError {
    fn from(_: ActorExited) -> Self {
        ResetError::ActorExited
    }
}

impl From<ActorExited> for SessionError {
    fn from(_: ActorExited) -> Self {
        SessionError::ActorExited
    }
}

impl From<ActorExited> for BackupError {
    fn from(_: ActorExited) -> Self {
        BackupError::ActorExited
    }
}

impl From<ActorExited> for TransitionError {
    fn from(_: ActorExited) -> Self {
        TransitionError::ActorExited
    }
}

impl From<SessionValidationError> for SessionError {
    fn from(e: SessionValidationError) -> Self {
        SessionError::Validation(e)
    }
}

impl From<BackupError> for BackupReplyFromPeerError {
    fn from(e: BackupError) -> Self {
        match e {
            BackupError::StaleTerm { current_term } => BackupReplyFromPeerError::StaleTerm { current_term },
            BackupError::IndexGap { next_index } => BackupReplyFromPeerError::IndexGap { next_index },
            BackupError::EntryMismatch { index } => BackupReplyFromPeerError::EntryMismatch { index },
            BackupError::NotBackup => BackupReplyFromPeerError::NotBackup,
            BackupError::LocalIoError(ioe) => {
                BackupReplyFromPeerError::RetryableFailure(format!("Backup IO failure: {:?}", ioe))
            }
            BackupError::ActorExited => BackupReplyFromPeerError::RetryableFailure("Backup actor has exited".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_per_protocol() {
        let term = Term::new(1);
        let leader = RoleTransition::Leader { term };
        let follower = RoleTransition::Follower { term, leader: None };
        let candidate = RoleTransition::Candidate { term };
        let backup = RoleTransition::Backup { term, leader: None };

        assert!(leader.is_allowed_for(Protocol::Consensus));
        assert!(follower.is_allowed_for(Protocol::Consensus));
        assert!(candidate.is_allowed_for(Protocol::Consensus));
        assert!(!backup.is_allowed_for(Protocol::Consensus));

        assert!(leader.is_allowed_for(Protocol::PrimaryBackup));
        assert!(backup.is_allowed_for(Protocol::PrimaryBackup));
        assert!(!follower.is_allowed_for(Protocol::PrimaryBackup));
        assert!(!candidate.is_allowed_for(Protocol::PrimaryBackup));
    }
}

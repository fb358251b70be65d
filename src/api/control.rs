use crate::actor::ActorClient;
use crate::api::types::PartitionExited;
use crate::commitlog::Index;
use crate::partition;
use crate::partition::{MemberId, Protocol, Term};

/// PartitionControl is how the embedding system (elections, membership, storage management)
/// steers a partition.
#[derive(Clone)]
pub struct PartitionControl {
    actor_client: ActorClient,
}

impl PartitionControl {
    pub(crate) fn new(actor_client: ActorClient) -> Self {
        PartitionControl { actor_client }
    }

    /// Tears down the current role and starts the requested one.
    pub async fn transition(&self, transition: RoleTransition) -> Result<(), TransitionError> {
        self.actor_client
            .transition(partition::RoleTransition::from(transition))
            .await
            .map_err(TransitionError::from)
    }

    /// Discards entries before `index`, never past the commit index. Returns the first index still
    /// in the log.
    pub async fn compact(&self, index: u64) -> Result<u64, PartitionExited> {
        let index = Index::from_wire(index).unwrap_or_else(Index::start_index);
        let first_index = self.actor_client.compact(index).await?;

        Ok(first_index.as_u64())
    }

    /// Stops the partition. Every request made afterward fails with a partition exited error.
    pub async fn close(&self) -> Result<(), PartitionExited> {
        self.actor_client.close().await?;
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoleTransition {
    Leader { term: u64 },
    Follower { term: u64, leader: Option<String> },
    Candidate { term: u64 },
    Backup { term: u64, leader: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("{requested} role is not part of the {protocol:?} protocol")]
    WrongProtocol {
        protocol: Protocol,
        requested: &'static str,
    },

    #[error("Requested term is out of date, current term is {current_term}")]
    StaleTerm { current_term: u64 },

    #[error("Leader {0} is not a member of this partition")]
    UnknownLeader(String),

    /// Leading a term starts exactly once. Requesting it again leaves the running leader alone.
    #[error("Already leader for term {term}")]
    AlreadyLeader { term: u64 },

    #[error("Partition task has exited")]
    PartitionExited,
}

// ------- Conversions --------

impl From<RoleTransition> for partition::RoleTransition {
    fn from(transition: RoleTransition) -> Self {
        match transition {
            RoleTransition::Leader { term } => partition::RoleTransition::Leader { term: Term::new(term) },
            RoleTransition::Follower { term, leader } => partition::RoleTransition::Follower {
                term: Term::new(term),
                leader: leader.map(MemberId::new),
            },
            RoleTransition::Candidate { term } => partition::RoleTransition::Candidate { term: Term::new(term) },
            RoleTransition::Backup { term, leader } => partition::RoleTransition::Backup {
                term: Term::new(term),
                leader: leader.map(MemberId::new),
            },
        }
    }
}

impl From<partition::TransitionError> for TransitionError {
    fn from(internal_error: partition::TransitionError) -> Self {
        match internal_error {
            partition::TransitionError::WrongProtocol { protocol, requested } => {
                TransitionError::WrongProtocol { protocol, requested }
            }
            partition::TransitionError::StaleTerm { current_term } => TransitionError::StaleTerm {
                current_term: current_term.as_u64(),
            },
            partition::TransitionError::UnknownLeader(member_id) => {
                TransitionError::UnknownLeader(member_id.into_inner())
            }
            partition::TransitionError::AlreadyLeader { term } => TransitionError::AlreadyLeader { term: term.as_u64() },
            partition::TransitionError::ActorExited => TransitionError::PartitionExited,
        }
    }
}

use crate::actor::ActorClient;
use crate::api::types::LeaderInfo;
use crate::commitlog::Index;
use crate::partition;
use crate::partition::{MemberId, ReplicationError};
use bytes::Bytes;
use std::io;

/// DistributedLog is the write and consume side of a partition. Both only succeed on the leader.
#[derive(Clone)]
pub struct DistributedLog {
    actor_client: ActorClient,
}

impl DistributedLog {
    pub(crate) fn new(actor_client: ActorClient) -> Self {
        DistributedLog { actor_client }
    }

    /// Appends `value` and waits until the partition's replication strategy considers it
    /// replicated.
    pub async fn append(&self, input: AppendInput) -> Result<AppendOutput, AppendError> {
        let internal_input = partition::AppendInput { value: input.value };

        self.actor_client
            .append(internal_input)
            .await
            .map(AppendOutput::from)
            .map_err(AppendError::from)
    }

    /// Starts streaming records to `member_id`'s subscriber for `subject`. An existing consumer for
    /// the same member and subject is replaced.
    pub async fn consume(&self, input: ConsumeInput) -> Result<(), ConsumeError> {
        let internal_input = partition::ConsumeInput {
            member_id: MemberId::new(input.member_id),
            subject: input.subject,
            index: Index::from_wire(input.index),
        };

        self.actor_client
            .consume(internal_input)
            .await
            .map_err(ConsumeError::from)
    }

    /// Repositions an existing consumer. Resetting a consumer that doesn't exist does nothing.
    pub async fn reset(&self, input: ConsumeInput) -> Result<(), ConsumeError> {
        let internal_input = partition::ResetInput {
            member_id: MemberId::new(input.member_id),
            subject: input.subject,
            index: Index::from_wire(input.index),
        };

        self.actor_client
            .reset(internal_input)
            .await
            .map_err(ConsumeError::from)
    }
}

#[derive(Debug)]
pub struct AppendInput {
    pub value: Bytes,
}

#[derive(Debug, Eq, PartialEq)]
pub struct AppendOutput {
    pub term: u64,
    pub index: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error("I'm not leader")]
    NotLeader(Option<LeaderInfo>),

    // Nothing was replicated.
    #[error("Failed to persist log entry")]
    LocalIoError(io::Error),

    // The entry was stored locally and may still reach backups later.
    #[error("Failed to replicate log entry: {0}")]
    Replication(ReplicationError),

    #[error("Partition task has exited")]
    PartitionExited,
}

#[derive(Clone, Debug)]
pub struct ConsumeInput {
    pub member_id: String,
    pub subject: String,
    /// First index to deliver. 0 means the start of the log.
    pub index: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("I'm not leader")]
    NotLeader(Option<LeaderInfo>),

    #[error("Partition task has exited")]
    PartitionExited,
}

// ------- Conversions --------

impl From<partition::AppendOutput> for AppendOutput {
    fn from(internal_output: partition::AppendOutput) -> Self {
        AppendOutput {
            term: internal_output.term.as_u64(),
            index: internal_output.index.as_u64(),
        }
    }
}

impl From<partition::AppendError> for AppendError {
    fn from(internal_error: partition::AppendError) -> Self {
        match internal_error {
            partition::AppendError::NotLeader(leader) => AppendError::NotLeader(leader.map(LeaderInfo::from)),
            partition::AppendError::LocalIoError(e) => AppendError::LocalIoError(e),
            partition::AppendError::Replication(e) => AppendError::Replication(e),
            partition::AppendError::ActorExited => AppendError::PartitionExited,
        }
    }
}

impl From<partition::ConsumeError> for ConsumeError {
    fn from(internal_error: partition::ConsumeError) -> Self {
        match internal_error {
            partition::ConsumeError::NotLeader(leader) => ConsumeError::NotLeader(leader.map(LeaderInfo::from)),
            partition::ConsumeError::ActorExited => ConsumeError::PartitionExited,
        }
    }
}

impl From<partition::ResetError> for ConsumeError {
    fn from(internal_error: partition::ResetError) -> Self {
        match internal_error {
            partition::ResetError::NotLeader(leader) => ConsumeError::NotLeader(leader.map(LeaderInfo::from)),
            partition::ResetError::ActorExited => ConsumeError::PartitionExited,
        }
    }
}

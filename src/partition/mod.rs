mod consumer;
mod local_state;
mod log;
mod members;
mod partition;
mod partition_api;
mod protocol;
mod replication;
mod role;
#[cfg(test)]
mod test_utils;
mod timers;

pub(crate) use consumer::ConsumerKey;
pub(crate) use local_state::PersistentLocalState;
pub(crate) use local_state::Term;
pub(crate) use local_state::VolatileLocalState;
pub(crate) use log::LogEntry;
pub(crate) use members::LeaderRedirectInfo;
pub(crate) use members::MemberId;
pub(crate) use members::MemberMetadata;
pub(crate) use members::Members;
pub(crate) use members::MembersError;
pub(crate) use partition::Partition;
pub(crate) use partition::PartitionConfig;
pub(crate) use partition::PartitionSettings;
pub(crate) use partition_api::*;
pub use protocol::Protocol;
pub use replication::AckPolicy;
pub(crate) use replication::BackupOperation;
pub use replication::ReplicationError;
pub use replication::ReplicationStrategy;
pub(crate) use role::RoleChangeListener;
pub(crate) use role::RoleSnapshot;

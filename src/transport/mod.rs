//! The ways partition members reach each other: leader to backup replication requests, and
//! records produced to subscribers.

mod grpc;
mod local;
mod subscriber_hub;

use crate::partition::{BackupInput, BackupOutput, BackupReplyFromPeerError, MemberId, RecordsRequest};

pub(crate) use grpc::GrpcTransport;
pub use local::LocalNetwork;
pub(crate) use subscriber_hub::SubscriberHub;

#[async_trait::async_trait]
pub(crate) trait Transport: Send + Sync {
    /// Request/response call to a backup's partition.
    async fn backup(&self, to: &MemberId, request: BackupInput) -> Result<BackupOutput, BackupReplyFromPeerError>;

    /// One-way delivery to a subscriber. Records produced to the same member arrive in the order
    /// they were produced, or not at all.
    fn produce(&self, to: &MemberId, subject: &str, request: RecordsRequest);
}

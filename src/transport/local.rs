use crate::actor::WeakActorClient;
use crate::partition::{BackupInput, BackupOutput, BackupReplyFromPeerError, MemberId, RecordsRequest};
use crate::transport::{SubscriberHub, Transport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// LocalNetwork connects partitions living in the same process. Every partition created with the
/// same LocalNetwork can replicate to, and produce records for, the others.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    members: Arc<Mutex<HashMap<MemberId, LocalEndpoint>>>,
}

#[derive(Clone)]
struct LocalEndpoint {
    partition: WeakActorClient,
    subscribers: SubscriberHub,
}

impl LocalNetwork {
    pub fn new() -> Self {
        LocalNetwork::default()
    }

    pub(crate) fn register(&self, member_id: MemberId, partition: WeakActorClient, subscribers: SubscriberHub) {
        self.members
            .lock()
            .expect("LocalNetwork.register() mutex guard poison")
            .insert(
                member_id,
                LocalEndpoint {
                    partition,
                    subscribers,
                },
            );
    }

    fn endpoint(&self, member_id: &MemberId) -> Option<LocalEndpoint> {
        self.members
            .lock()
            .expect("LocalNetwork.endpoint() mutex guard poison")
            .get(member_id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Transport for LocalNetwork {
    async fn backup(&self, to: &MemberId, request: BackupInput) -> Result<BackupOutput, BackupReplyFromPeerError> {
        // Lock is released before we wait on the peer.
        match self.endpoint(to) {
            Some(endpoint) => endpoint
                .partition
                .backup(request)
                .await
                .map_err(BackupReplyFromPeerError::from),
            None => Err(BackupReplyFromPeerError::RetryableFailure(format!(
                "Member {:?} is not on the local network",
                to
            ))),
        }
    }

    fn produce(&self, to: &MemberId, subject: &str, request: RecordsRequest) {
        if let Some(endpoint) = self.endpoint(to) {
            endpoint.subscribers.deliver(subject, request);
        }
    }
}

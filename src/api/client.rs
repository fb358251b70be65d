use crate::api::control::PartitionControl;
use crate::api::distributed_log::DistributedLog;
use crate::api::event_bus::RoleEventListener;
use crate::api::session_service::SessionService;
use crate::api::subscriber::Subscriber;

/// PartitionClient is everything an application gets to interact with its local member of a
/// partition. Each part can be cloned and handed out separately.
pub struct PartitionClient {
    pub log: DistributedLog,
    pub sessions: SessionService,
    pub control: PartitionControl,
    pub subscriber: Subscriber,
    pub event_listener: RoleEventListener,
}

use crate::actor::{ActorClient, PartitionActor};
use crate::api::client::PartitionClient;
use crate::api::control::PartitionControl;
use crate::api::distributed_log::DistributedLog;
use crate::api::event_bus::RoleEventListener;
use crate::api::options::{PartitionOptions, PartitionOptionsValidated};
use crate::api::session_service::SessionService;
use crate::api::subscriber::Subscriber;
use crate::api::types::MemberInfo;
use crate::commitlog::InMemoryLog;
use crate::partition;
use crate::partition::{MemberId, MemberMetadata, Members, MembersError, Partition, Protocol, VolatileLocalState};
use crate::server;
use crate::server::RpcServer;
use crate::session::SessionRegistry;
use crate::transport::{GrpcTransport, LocalNetwork, SubscriberHub, Transport};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::io;
use std::sync::Arc;

pub struct PartitionConfig {
    pub my_member_id: String,
    pub members: Vec<MemberInfo>,
    pub protocol: Protocol,
    pub transport: TransportConfig,
    pub info_logger: slog::Logger,
    pub options: PartitionOptions,
}

/// How members of the partition reach each other.
#[derive(Clone)]
pub enum TransportConfig {
    /// Each member runs a peer gRPC server on its `MemberInfo` address.
    Grpc,
    /// Members live in this process and share the given network.
    Local(LocalNetwork),
}

#[derive(Debug, thiserror::Error)]
pub enum PartitionCreationError {
    #[error("Invalid member list: {0}")]
    InvalidMembers(String),
    #[error("Illegal options for configuring partition: {0}")]
    IllegalOptions(String),
    #[error("Log initialization failure")]
    LogInitialization(io::Error),
    #[error("My member ID is not in the member list")]
    MeNotInCluster,
}

/// Creates the local member of a partition and starts its background tasks. Must be called
/// from within a tokio runtime.
///
/// The member starts out as Follower (consensus) or Backup (primary-backup) and waits for a
/// role transition.
pub async fn try_create_partition(config: PartitionConfig) -> Result<PartitionClient, PartitionCreationError> {
    let root_logger = config
        .info_logger
        .new(slog::o!("Member" => config.my_member_id.clone()));

    let options = PartitionOptionsValidated::try_from(config.options)
        .map_err(|e| PartitionCreationError::IllegalOptions(e.to_string()))?;

    let my_member_id = MemberId::new(config.my_member_id);
    let all_members = config.members.into_iter().map(MemberMetadata::from).collect();
    let members = Members::new(my_member_id.clone(), all_members).map_err(|e| match e {
        MembersError::MeNotInCluster => PartitionCreationError::MeNotInCluster,
        MembersError::DuplicateMember(_) => PartitionCreationError::InvalidMembers(e.to_string()),
    })?;

    let commit_log = InMemoryLog::create(root_logger.clone()).map_err(PartitionCreationError::LogInitialization)?;

    let (actor_client, actor_queue_rx) = ActorClient::new(options.actor_queue_size);
    let sessions = SessionRegistry::new();
    let subscribers = SubscriberHub::new();

    let mut server_shutdown = None;
    let mut server_start = None;
    let transport: Arc<dyn Transport> = match config.transport {
        TransportConfig::Grpc => {
            let addresses: HashMap<_, _> = members
                .iter()
                .map(|member| (member.member_id().clone(), member.socket_addr()))
                .collect();
            let my_server_addr = addresses
                .get(&my_member_id)
                .copied()
                .ok_or(PartitionCreationError::MeNotInCluster)?;
            let (shutdown_handle, shutdown_signal) = server::shutdown_signal();
            server_shutdown = Some(shutdown_handle);
            server_start = Some((my_server_addr, shutdown_signal));

            Arc::new(GrpcTransport::new(root_logger.clone(), addresses))
        }
        TransportConfig::Local(network) => {
            network.register(my_member_id, actor_client.weak(), subscribers.clone());
            Arc::new(network)
        }
    };

    let (partition, role_change_listener) = Partition::new(partition::PartitionConfig {
        logger: root_logger.clone(),
        members,
        protocol: config.protocol,
        log: commit_log,
        local_state: Box::new(VolatileLocalState::new()),
        sessions: sessions.clone(),
        transport,
        actor_client: actor_client.weak(),
        settings: options.partition_settings(),
        server_shutdown,
    })
    .map_err(PartitionCreationError::LogInitialization)?;

    let partition_actor = PartitionActor::new(root_logger.clone(), actor_queue_rx, partition);
    tokio::spawn(partition_actor.run_event_loop());

    if let Some((my_server_addr, server_shutdown_signal)) = server_start {
        let rpc_server = RpcServer::new(root_logger.clone(), actor_client.weak(), subscribers.clone());
        tokio::spawn(rpc_server.run(my_server_addr, server_shutdown_signal));
    }

    Ok(PartitionClient {
        log: DistributedLog::new(actor_client.clone()),
        sessions: SessionService::new(actor_client.clone(), sessions),
        control: PartitionControl::new(actor_client),
        subscriber: Subscriber::new(subscribers),
        event_listener: RoleEventListener::new(role_change_listener),
    })
}

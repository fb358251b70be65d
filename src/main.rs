use bytes::Bytes;
use distlog::{
    AppendInput, ConsumeInput, LocalNetwork, MemberInfo, OpenSessionRequest, PartitionClient, PartitionConfig,
    PartitionOptions, Protocol, RoleTransition, TransportConfig,
};
use slog::Drain;
use std::error::Error;
use std::net::Ipv4Addr;

// Runs a three member partition inside this process, appends a few values on the leader and
// tails them from another member.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let logger = create_root_logger_for_stdout();
    let network = LocalNetwork::new();

    let member_ids: Vec<String> = (1..=3).map(|i| format!("member-{}", i)).collect();
    let mut clients = Vec::with_capacity(member_ids.len());
    for member_id in member_ids.iter() {
        let client = distlog::try_create_partition(PartitionConfig {
            my_member_id: member_id.clone(),
            members: members(&member_ids),
            protocol: Protocol::Consensus,
            transport: TransportConfig::Local(network.clone()),
            info_logger: logger.clone(),
            options: PartitionOptions::default(),
        })
        .await?;
        clients.push(client);
    }

    let leader_id = member_ids[0].clone();
    transition_all(&clients, &leader_id).await?;

    let leader = &clients[0];
    let mut records = clients[1].subscriber.subscribe("demo");
    leader
        .log
        .consume(ConsumeInput {
            member_id: member_ids[1].clone(),
            subject: "demo".to_string(),
            index: 0,
        })
        .await?;

    for value in &["hello", "distributed", "log"] {
        let output = leader
            .log
            .append(AppendInput {
                value: Bytes::from(value.to_string()),
            })
            .await?;
        slog::info!(logger, "Appended {:?} at {:?}", value, output);
    }

    for _ in 0..3 {
        if let Some(record) = records.next().await {
            slog::info!(logger, "{} received {:?}", member_ids[1], record);
        }
    }

    let session = leader
        .sessions
        .open_session(OpenSessionRequest {
            client: Some("demo-client".to_string()),
            name: Some("counter".to_string()),
            state_machine: Some("counter".to_string()),
            timeout_millis: 5000,
        })
        .await?;
    slog::info!(logger, "Opened session {:?}", session);

    for client in clients.iter() {
        client.control.close().await?;
    }

    Ok(())
}

async fn transition_all(clients: &[PartitionClient], leader_id: &str) -> Result<(), Box<dyn Error>> {
    // Followers first, so the leader's first heartbeat finds them ready.
    for client in clients.iter().skip(1) {
        client
            .control
            .transition(RoleTransition::Follower {
                term: 1,
                leader: Some(leader_id.to_string()),
            })
            .await?;
    }
    clients[0].control.transition(RoleTransition::Leader { term: 1 }).await?;

    Ok(())
}

fn members(member_ids: &[String]) -> Vec<MemberInfo> {
    member_ids
        .iter()
        .enumerate()
        .map(|(i, member_id)| MemberInfo {
            member_id: member_id.clone(),
            ip_addr: Ipv4Addr::LOCALHOST,
            port: 7000 + i as u16,
        })
        .collect()
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}

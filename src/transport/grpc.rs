use crate::commitlog::Index;
use crate::grpc::grpc_log_peer_client::GrpcLogPeerClient;
use crate::grpc::{
    proto_backup_error, proto_backup_result, ProtoBackupOperation, ProtoBackupReq, ProtoBackupResult, ProtoRecord,
    ProtoRecordsReq,
};
use crate::partition::{BackupInput, BackupOutput, BackupReplyFromPeerError, MemberId, RecordsRequest, Term};
use crate::transport::Transport;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tonic::codegen::http::uri;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

/// GrpcTransport reaches other members over their peer gRPC server.
pub(crate) struct GrpcTransport {
    logger: slog::Logger,
    clients: PeerClients,
    // One forwarding task per member keeps produced records in order.
    record_forwarders: Mutex<HashMap<MemberId, RecordForwarder>>,
}

// Undelivered records are retried after somewhere between one and two of these.
const RECORD_RETRY_DELAY: Duration = Duration::from_millis(50);

struct RecordForwarder {
    tx: mpsc::UnboundedSender<ProtoRecordsReq>,
    // The forwarding task keeps retrying a record only while this is alive.
    _alive: Arc<()>,
}

#[async_trait::async_trait]
trait RecordSink: Send + Sync + 'static {
    async fn deliver(&self, rpc_request: ProtoRecordsReq) -> Result<(), String>;
}

struct SubscriberSink {
    clients: PeerClients,
    member_id: MemberId,
}

#[async_trait::async_trait]
impl RecordSink for SubscriberSink {
    async fn deliver(&self, rpc_request: ProtoRecordsReq) -> Result<(), String> {
        let mut client = self
            .clients
            .get(&self.member_id)
            .await
            .map_err(|e| format!("can't reach subscriber: {}", e))?;

        match client.records(rpc_request).await {
            Ok(_) => Ok(()),
            Err(rpc_status) => {
                self.clients.forget(&self.member_id).await;
                Err(format!("{:?}", rpc_status))
            }
        }
    }
}

impl GrpcTransport {
    pub(crate) fn new(logger: slog::Logger, addresses: HashMap<MemberId, SocketAddr>) -> Self {
        GrpcTransport {
            logger: logger.clone(),
            clients: PeerClients {
                logger,
                addresses: Arc::new(addresses),
                connected: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            },
            record_forwarders: Mutex::new(HashMap::new()),
        }
    }

    fn spawn_forwarder(&self, member_id: MemberId) -> RecordForwarder {
        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(());
        tokio::task::spawn(forward_records(
            self.logger.new(slog::o!("Subscriber" => format!("{:?}", member_id))),
            SubscriberSink {
                clients: self.clients.clone(),
                member_id,
            },
            Arc::downgrade(&alive),
            RECORD_RETRY_DELAY,
            rx,
        ));

        RecordForwarder { tx, _alive: alive }
    }
}

/// Delivers records in the order they were produced. A record that fails to go out is retried
/// until it's delivered, so the subscriber never sees a gap it isn't told about.
async fn forward_records<S: RecordSink>(
    logger: slog::Logger,
    sink: S,
    alive: Weak<()>,
    retry_delay: Duration,
    mut rx: mpsc::UnboundedReceiver<ProtoRecordsReq>,
) {
    while let Some(rpc_request) = rx.recv().await {
        slog::trace!(logger, "ClientWire - {:?}", rpc_request);
        let mut attempts = 1;
        while let Err(e) = sink.deliver(rpc_request.clone()).await {
            if alive.upgrade().is_none() {
                slog::info!(logger, "Record forwarder dropped with records still undelivered");
                return;
            }

            let delay = rand::thread_rng().gen_range(retry_delay..=retry_delay * 2);
            slog::warn!(
                logger,
                "Failed to deliver record (attempt {}), retrying in {:?}: {}",
                attempts,
                delay,
                e
            );
            tokio::time::sleep(delay).await;
            attempts += 1;
        }
    }
}

#[async_trait::async_trait]
impl Transport for GrpcTransport {
    async fn backup(&self, to: &MemberId, request: BackupInput) -> Result<BackupOutput, BackupReplyFromPeerError> {
        let mut client = self
            .clients
            .get(to)
            .await
            .map_err(|e| BackupReplyFromPeerError::RetryableFailure(e.to_string()))?;

        let rpc_request = convert_backup_request(request);
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let rpc_reply = client.backup(rpc_request).await;
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_reply);

        if rpc_reply.is_err() {
            self.clients.forget(to).await;
        }
        convert_backup_rpc_reply(rpc_reply.map(|response| response.into_inner()))
    }

    fn produce(&self, to: &MemberId, subject: &str, request: RecordsRequest) {
        let rpc_request = ProtoRecordsReq {
            subject: subject.to_string(),
            record: Some(ProtoRecord {
                index: request.record.index.as_u64(),
                timestamp: request.record.timestamp,
                value: request.record.value.to_vec(),
            }),
            reset: request.reset,
        };

        let mut forwarders = self
            .record_forwarders
            .lock()
            .expect("GrpcTransport.produce() mutex guard poison");
        let forwarder = forwarders
            .entry(to.clone())
            .or_insert_with(|| self.spawn_forwarder(to.clone()));
        if forwarder.tx.send(rpc_request).is_err() {
            slog::warn!(self.logger, "Record forwarder for {:?} has exited", to);
            forwarders.remove(to);
        }
    }
}

#[derive(Clone)]
struct PeerClients {
    logger: slog::Logger,
    addresses: Arc<HashMap<MemberId, SocketAddr>>,
    connected: Arc<tokio::sync::Mutex<HashMap<MemberId, GrpcLogPeerClient<Channel>>>>,
}

impl PeerClients {
    async fn get(&self, member_id: &MemberId) -> Result<GrpcLogPeerClient<Channel>, ConnectError> {
        if let Some(client) = self.connected.lock().await.get(member_id) {
            return Ok(client.clone());
        }

        let socket_addr = self
            .addresses
            .get(member_id)
            .ok_or_else(|| ConnectError::UnknownMember(member_id.clone()))?;
        let url = format!("http://{}", socket_addr);
        slog::info!(self.logger, "Connecting to {:?} at {} ...", member_id, url);
        let endpoint = Endpoint::from_shared(url)?;
        let client = GrpcLogPeerClient::new(endpoint.connect().await?);

        self.connected.lock().await.insert(member_id.clone(), client.clone());
        Ok(client)
    }

    async fn forget(&self, member_id: &MemberId) {
        self.connected.lock().await.remove(member_id);
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConnectError {
    #[error("Member {0:?} has no known address")]
    UnknownMember(MemberId),
    #[error("Invalid peer URI: {0}")]
    InvalidUri(#[from] uri::InvalidUri),
    #[error("Failed to connect to peer: {0}")]
    ConnectFailure(#[from] tonic::transport::Error),
}

fn convert_backup_request(request: BackupInput) -> ProtoBackupReq {
    ProtoBackupReq {
        leader_id: request.leader_id.into_inner(),
        term: request.term.as_u64(),
        commit_index: request.commit_index.map(|ci| ci.as_u64()).unwrap_or(0),
        prev_index: request.prev_entry.map(|(index, _)| index.as_u64()).unwrap_or(0),
        prev_term: request.prev_entry.map(|(_, term)| term.as_u64()).unwrap_or(0),
        operations: request
            .operations
            .into_iter()
            .map(|operation| ProtoBackupOperation {
                index: operation.index.as_u64(),
                term: operation.term.as_u64(),
                timestamp: operation.timestamp,
                value: operation.value.to_vec(),
            })
            .collect(),
    }
}

fn convert_backup_rpc_reply(
    rpc_reply: Result<ProtoBackupResult, Status>,
) -> Result<BackupOutput, BackupReplyFromPeerError> {
    match rpc_reply {
        Ok(rpc_result) => match rpc_result.result {
            Some(proto_backup_result::Result::Ok(success)) => Ok(BackupOutput {
                last_index: Index::from_wire(success.last_index),
            }),
            Some(proto_backup_result::Result::Err(err)) => match err.err {
                Some(proto_backup_error::Err::ServerFault(payload)) => Err(
                    BackupReplyFromPeerError::RetryableFailure(format!("Explicit server fault: {:?}", payload.message)),
                ),
                Some(proto_backup_error::Err::StaleTerm(payload)) => Err(BackupReplyFromPeerError::StaleTerm {
                    current_term: Term::new(payload.current_term),
                }),
                Some(proto_backup_error::Err::IndexGap(payload)) => match Index::from_wire(payload.next_index) {
                    Some(next_index) => Err(BackupReplyFromPeerError::IndexGap { next_index }),
                    None => Err(BackupReplyFromPeerError::RetryableFailure(
                        "Malformed IndexGap with next index 0".into(),
                    )),
                },
                Some(proto_backup_error::Err::EntryMismatch(payload)) => match Index::from_wire(payload.index) {
                    Some(index) => Err(BackupReplyFromPeerError::EntryMismatch { index }),
                    None => Err(BackupReplyFromPeerError::RetryableFailure(
                        "Malformed EntryMismatch with index 0".into(),
                    )),
                },
                Some(proto_backup_error::Err::NotBackup(_)) => Err(BackupReplyFromPeerError::NotBackup),
                None => Err(BackupReplyFromPeerError::RetryableFailure("Malformed Backup Err".into())),
            },
            None => Err(BackupReplyFromPeerError::RetryableFailure(
                "Malformed Backup Result".into(),
            )),
        },
        Err(rpc_status) => Err(BackupReplyFromPeerError::RetryableFailure(format!(
            "Un-modeled failure from Backup RPC call: {:?}",
            rpc_status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::{
        ProtoBackupError, ProtoBackupSuccess, ProtoEntryMismatch, ProtoIndexGap, ProtoNotBackup, ProtoStaleTerm,
    };
    use crate::partition::BackupOperation;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn err_result(err: proto_backup_error::Err) -> Result<ProtoBackupResult, Status> {
        Ok(ProtoBackupResult {
            result: Some(proto_backup_result::Result::Err(ProtoBackupError { err: Some(err) })),
        })
    }

    #[test]
    fn backup_request_to_wire() {
        let request = BackupInput {
            leader_id: MemberId::new("leader"),
            term: Term::new(2),
            commit_index: None,
            prev_entry: Some((Index::new(3), Term::new(1))),
            operations: vec![BackupOperation {
                index: Index::new(4),
                term: Term::new(2),
                timestamp: 99,
                value: Bytes::from_static(b"hi"),
            }],
        };

        let rpc_request = convert_backup_request(request);

        assert_eq!(rpc_request.leader_id, "leader");
        assert_eq!(rpc_request.term, 2);
        assert_eq!(rpc_request.commit_index, 0);
        assert_eq!((rpc_request.prev_index, rpc_request.prev_term), (3, 1));
        assert_eq!(
            rpc_request.operations,
            vec![ProtoBackupOperation {
                index: 4,
                term: 2,
                timestamp: 99,
                value: b"hi".to_vec(),
            }]
        );
    }

    #[test]
    fn backup_reply_from_wire() {
        let ok = Ok(ProtoBackupResult {
            result: Some(proto_backup_result::Result::Ok(ProtoBackupSuccess { last_index: 7 })),
        });
        assert_eq!(
            convert_backup_rpc_reply(ok),
            Ok(BackupOutput {
                last_index: Some(Index::new(7))
            })
        );

        let empty_log = Ok(ProtoBackupResult {
            result: Some(proto_backup_result::Result::Ok(ProtoBackupSuccess { last_index: 0 })),
        });
        assert_eq!(convert_backup_rpc_reply(empty_log), Ok(BackupOutput { last_index: None }));

        assert_eq!(
            convert_backup_rpc_reply(err_result(proto_backup_error::Err::StaleTerm(ProtoStaleTerm {
                current_term: 5
            }))),
            Err(BackupReplyFromPeerError::StaleTerm {
                current_term: Term::new(5)
            })
        );
        assert_eq!(
            convert_backup_rpc_reply(err_result(proto_backup_error::Err::IndexGap(ProtoIndexGap {
                next_index: 3
            }))),
            Err(BackupReplyFromPeerError::IndexGap {
                next_index: Index::new(3)
            })
        );
        assert_eq!(
            convert_backup_rpc_reply(err_result(proto_backup_error::Err::EntryMismatch(ProtoEntryMismatch {
                index: 2
            }))),
            Err(BackupReplyFromPeerError::EntryMismatch { index: Index::new(2) })
        );
        assert_eq!(
            convert_backup_rpc_reply(err_result(proto_backup_error::Err::NotBackup(ProtoNotBackup {}))),
            Err(BackupReplyFromPeerError::NotBackup)
        );
        assert!(matches!(
            convert_backup_rpc_reply(Ok(ProtoBackupResult { result: None })),
            Err(BackupReplyFromPeerError::RetryableFailure(_))
        ));
        assert!(matches!(
            convert_backup_rpc_reply(Err(Status::unavailable("down"))),
            Err(BackupReplyFromPeerError::RetryableFailure(_))
        ));
    }

    // Fails the first `failures` deliveries, then remembers every record it accepts.
    #[derive(Clone, Default)]
    struct FlakySink {
        failures: Arc<AtomicUsize>,
        delivered: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait::async_trait]
    impl RecordSink for FlakySink {
        async fn deliver(&self, rpc_request: ProtoRecordsReq) -> Result<(), String> {
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err("subscriber unavailable".into());
            }

            let index = rpc_request.record.map(|record| record.index).unwrap_or(0);
            self.delivered.lock().unwrap().push(index);
            Ok(())
        }
    }

    fn records_request(index: u64) -> ProtoRecordsReq {
        ProtoRecordsReq {
            subject: "s".to_string(),
            record: Some(ProtoRecord {
                index,
                timestamp: 0,
                value: vec![],
            }),
            reset: false,
        }
    }

    #[tokio::test]
    async fn failed_record_is_retried_before_later_ones() {
        let sink = FlakySink::default();
        sink.failures.store(2, Ordering::SeqCst);
        let alive = Arc::new(());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn(forward_records(
            slog::Logger::root(slog::Discard, slog::o!()),
            sink.clone(),
            Arc::downgrade(&alive),
            Duration::from_millis(1),
            rx,
        ));

        for index in 1..=3 {
            tx.send(records_request(index)).unwrap();
        }
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        assert_eq!(*sink.delivered.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(sink.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_forwarder_stops_retrying() {
        let sink = FlakySink::default();
        sink.failures.store(usize::MAX, Ordering::SeqCst);
        let alive = Arc::new(());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn(forward_records(
            slog::Logger::root(slog::Discard, slog::o!()),
            sink.clone(),
            Arc::downgrade(&alive),
            Duration::from_millis(1),
            rx,
        ));

        tx.send(records_request(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(alive);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        assert!(sink.delivered.lock().unwrap().is_empty());
        assert!(sink.failures.load(Ordering::SeqCst) < usize::MAX);
    }
}

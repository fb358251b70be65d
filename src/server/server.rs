use crate::actor::WeakActorClient;
use crate::commitlog::Index;
use crate::grpc::grpc_log_peer_server::{GrpcLogPeer, GrpcLogPeerServer};
use crate::grpc::{
    proto_backup_error, proto_backup_result, ProtoBackupError, ProtoBackupReq, ProtoBackupResult, ProtoBackupSuccess,
    ProtoEntryMismatch, ProtoIndexGap, ProtoNotBackup, ProtoRecordsAck, ProtoRecordsReq, ProtoServerFault, ProtoStaleTerm,
};
use crate::partition::{
    BackupError, BackupInput, BackupOperation, BackupOutput, MemberId, Record, RecordsRequest, Term,
};
use crate::server::RpcServerShutdownSignal;
use crate::transport::SubscriberHub;
use bytes::Bytes;
use std::net::SocketAddr;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer is the type that implements the peer gRPC interface of one member.
pub(crate) struct RpcServer {
    logger: slog::Logger,
    local_partition: WeakActorClient,
    subscribers: SubscriberHub,
}

impl RpcServer {
    pub(crate) fn new(logger: slog::Logger, local_partition: WeakActorClient, subscribers: SubscriberHub) -> Self {
        RpcServer {
            logger,
            local_partition,
            subscribers,
        }
    }

    pub(crate) async fn run(self, socket_addr: SocketAddr, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcLogPeerServer::new(self))
            .serve_with_shutdown(socket_addr, shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_backup(&self, rpc_request: ProtoBackupReq) -> Result<ProtoBackupResult, Status> {
        let app_input = Self::convert_backup_input(rpc_request)?;
        let app_result = self.local_partition.backup(app_input).await;
        let rpc_reply = Self::convert_backup_result(app_result);
        Ok(rpc_reply)
    }

    fn convert_backup_input(rpc_request: ProtoBackupReq) -> Result<BackupInput, Status> {
        let mut operations = Vec::with_capacity(rpc_request.operations.len());
        for proto_operation in rpc_request.operations {
            let index = Index::from_wire(proto_operation.index)
                .ok_or_else(|| Status::invalid_argument("Operation index 0"))?;
            operations.push(BackupOperation {
                index,
                term: Term::new(proto_operation.term),
                timestamp: proto_operation.timestamp,
                value: Bytes::from(proto_operation.value),
            });
        }

        let prev_term = rpc_request.prev_term;
        Ok(BackupInput {
            leader_id: MemberId::new(rpc_request.leader_id),
            term: Term::new(rpc_request.term),
            commit_index: Index::from_wire(rpc_request.commit_index),
            operations,
            prev_entry: Index::from_wire(rpc_request.prev_index).map(|index| (index, Term::new(prev_term))),
        })
    }

    fn convert_backup_result(app_result: Result<BackupOutput, BackupError>) -> ProtoBackupResult {
        let err = match app_result {
            Ok(output) => {
                return ProtoBackupResult {
                    result: Some(proto_backup_result::Result::Ok(ProtoBackupSuccess {
                        last_index: output.last_index.map(|index| index.as_u64()).unwrap_or(0),
                    })),
                }
            }
            Err(BackupError::StaleTerm { current_term }) => proto_backup_error::Err::StaleTerm(ProtoStaleTerm {
                current_term: current_term.as_u64(),
            }),
            Err(BackupError::IndexGap { next_index }) => proto_backup_error::Err::IndexGap(ProtoIndexGap {
                next_index: next_index.as_u64(),
            }),
            Err(BackupError::EntryMismatch { index }) => {
                proto_backup_error::Err::EntryMismatch(ProtoEntryMismatch { index: index.as_u64() })
            }
            Err(BackupError::NotBackup) => proto_backup_error::Err::NotBackup(ProtoNotBackup {
                // Empty
            }),
            Err(BackupError::LocalIoError(_)) => proto_backup_error::Err::ServerFault(ProtoServerFault {
                message: "Local IO failure".to_string(),
            }),
            Err(BackupError::ActorExited) => proto_backup_error::Err::ServerFault(ProtoServerFault {
                message: "Server internal partition task has exited".to_string(),
            }),
        };

        ProtoBackupResult {
            result: Some(proto_backup_result::Result::Err(ProtoBackupError { err: Some(err) })),
        }
    }

    fn convert_records_request(rpc_request: ProtoRecordsReq) -> Result<(String, RecordsRequest), Status> {
        let proto_record = rpc_request
            .record
            .ok_or_else(|| Status::invalid_argument("Missing record"))?;
        let index = Index::from_wire(proto_record.index).ok_or_else(|| Status::invalid_argument("Record index 0"))?;

        Ok((
            rpc_request.subject,
            RecordsRequest {
                record: Record {
                    index,
                    timestamp: proto_record.timestamp,
                    value: Bytes::from(proto_record.value),
                },
                reset: rpc_request.reset,
            },
        ))
    }
}

#[async_trait::async_trait]
impl GrpcLogPeer for RpcServer {
    async fn backup(&self, rpc_request_wrapped: Request<ProtoBackupReq>) -> Result<Response<ProtoBackupResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_backup(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn records(&self, rpc_request_wrapped: Request<ProtoRecordsReq>) -> Result<Response<ProtoRecordsAck>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();
        slog::trace!(self.logger, "ServerWire - {:?}", rpc_request);

        let (subject, request) = Self::convert_records_request(rpc_request)?;
        if !self.subscribers.deliver(&subject, request) {
            slog::debug!(self.logger, "No subscriber for subject {:?}, dropping record", subject);
        }

        Ok(Response::new(ProtoRecordsAck {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::{ProtoBackupOperation, ProtoRecord};
    use std::io;

    #[test]
    fn backup_input_from_wire() {
        let input = RpcServer::convert_backup_input(ProtoBackupReq {
            leader_id: "leader".to_string(),
            term: 3,
            commit_index: 0,
            prev_index: 6,
            prev_term: 2,
            operations: vec![ProtoBackupOperation {
                index: 1,
                term: 3,
                timestamp: 42,
                value: b"v".to_vec(),
            }],
        })
        .unwrap();

        assert_eq!(input.leader_id, MemberId::new("leader"));
        assert_eq!(input.term, Term::new(3));
        assert_eq!(input.commit_index, None);
        assert_eq!(input.prev_entry, Some((Index::new(6), Term::new(2))));
        assert_eq!(
            input.operations,
            vec![BackupOperation {
                index: Index::new(1),
                term: Term::new(3),
                timestamp: 42,
                value: Bytes::from_static(b"v"),
            }]
        );

        let invalid = RpcServer::convert_backup_input(ProtoBackupReq {
            leader_id: "leader".to_string(),
            term: 3,
            commit_index: 0,
            prev_index: 0,
            prev_term: 0,
            operations: vec![ProtoBackupOperation::default()],
        });
        assert!(invalid.is_err());
    }

    #[test]
    fn backup_result_to_wire() {
        let ok = RpcServer::convert_backup_result(Ok(BackupOutput { last_index: None }));
        assert_eq!(
            ok.result,
            Some(proto_backup_result::Result::Ok(ProtoBackupSuccess { last_index: 0 }))
        );

        let gap = RpcServer::convert_backup_result(Err(BackupError::IndexGap {
            next_index: Index::new(4),
        }));
        assert_eq!(
            gap.result,
            Some(proto_backup_result::Result::Err(ProtoBackupError {
                err: Some(proto_backup_error::Err::IndexGap(ProtoIndexGap { next_index: 4 }))
            }))
        );

        let mismatch = RpcServer::convert_backup_result(Err(BackupError::EntryMismatch { index: Index::new(2) }));
        assert_eq!(
            mismatch.result,
            Some(proto_backup_result::Result::Err(ProtoBackupError {
                err: Some(proto_backup_error::Err::EntryMismatch(ProtoEntryMismatch { index: 2 }))
            }))
        );

        let io_failure = RpcServer::convert_backup_result(Err(BackupError::LocalIoError(io::Error::new(
            io::ErrorKind::Other,
            "boom",
        ))));
        assert!(matches!(
            io_failure.result,
            Some(proto_backup_result::Result::Err(ProtoBackupError {
                err: Some(proto_backup_error::Err::ServerFault(_))
            }))
        ));
    }

    #[test]
    fn records_request_from_wire() {
        let (subject, request) = RpcServer::convert_records_request(ProtoRecordsReq {
            subject: "x".to_string(),
            record: Some(ProtoRecord {
                index: 7,
                timestamp: 1,
                value: b"v".to_vec(),
            }),
            reset: true,
        })
        .unwrap();

        assert_eq!(subject, "x");
        assert_eq!(request.record.index, Index::new(7));
        assert!(request.reset);

        assert!(RpcServer::convert_records_request(ProtoRecordsReq {
            subject: "x".to_string(),
            record: None,
            reset: false,
        })
        .is_err());
    }
}

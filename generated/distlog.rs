#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackupOperation {
    #[prost(uint64, tag = "1")]
    pub index: u64,
    #[prost(uint64, tag = "2")]
    pub term: u64,
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    #[prost(bytes = "vec", tag = "4")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackupReq {
    #[prost(string, tag = "1")]
    pub leader_id: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub term: u64,
    /// 0 means nothing is committed.
    #[prost(uint64, tag = "3")]
    pub commit_index: u64,
    #[prost(message, repeated, tag = "4")]
    pub operations: ::prost::alloc::vec::Vec<ProtoBackupOperation>,
    /// The leader's entry right before the first operation. 0 means there is none.
    #[prost(uint64, tag = "5")]
    pub prev_index: u64,
    #[prost(uint64, tag = "6")]
    pub prev_term: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackupResult {
    #[prost(oneof = "proto_backup_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_backup_result::Result>,
}
/// Nested message and enum types in `ProtoBackupResult`.
pub mod proto_backup_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoBackupSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoBackupError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackupSuccess {
    /// 0 means the backup log is empty.
    #[prost(uint64, tag = "1")]
    pub last_index: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackupError {
    #[prost(oneof = "proto_backup_error::Err", tags = "1, 2, 3, 4, 5")]
    pub err: ::core::option::Option<proto_backup_error::Err>,
}
/// Nested message and enum types in `ProtoBackupError`.
pub mod proto_backup_error {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Err {
        #[prost(message, tag = "1")]
        ServerFault(super::ProtoServerFault),
        #[prost(message, tag = "2")]
        StaleTerm(super::ProtoStaleTerm),
        #[prost(message, tag = "3")]
        IndexGap(super::ProtoIndexGap),
        #[prost(message, tag = "4")]
        NotBackup(super::ProtoNotBackup),
        #[prost(message, tag = "5")]
        EntryMismatch(super::ProtoEntryMismatch),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoServerFault {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStaleTerm {
    #[prost(uint64, tag = "1")]
    pub current_term: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoIndexGap {
    #[prost(uint64, tag = "1")]
    pub next_index: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEntryMismatch {
    #[prost(uint64, tag = "1")]
    pub index: u64,
}
/// Empty
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNotBackup {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRecord {
    #[prost(uint64, tag = "1")]
    pub index: u64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(bytes = "vec", tag = "3")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRecordsReq {
    #[prost(string, tag = "1")]
    pub subject: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub record: ::core::option::Option<ProtoRecord>,
    #[prost(bool, tag = "3")]
    pub reset: bool,
}
/// Empty
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRecordsAck {}
#[doc = r" Generated client implementations."]
pub mod grpc_log_peer_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " Peer-to-peer traffic of a partition. Client requests (append, consume, sessions) are served"]
    #[doc = " in-process by the library and never cross this service."]
    pub struct GrpcLogPeerClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcLogPeerClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcLogPeerClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        #[doc = " Leader -> backup. Ships a batch of log operations."]
        pub async fn backup(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoBackupReq>,
        ) -> Result<tonic::Response<super::ProtoBackupResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/distlog.GrpcLogPeer/Backup");
            self.inner.unary(request.into_request(), path, codec).await
        }
        #[doc = " Leader -> subscriber member. One-way in spirit: the ack carries no information."]
        pub async fn records(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRecordsReq>,
        ) -> Result<tonic::Response<super::ProtoRecordsAck>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/distlog.GrpcLogPeer/Records");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
    impl<T: Clone> Clone for GrpcLogPeerClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcLogPeerClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcLogPeerClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_log_peer_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcLogPeerServer."]
    #[async_trait]
    pub trait GrpcLogPeer: Send + Sync + 'static {
        #[doc = " Leader -> backup. Ships a batch of log operations."]
        async fn backup(
            &self,
            request: tonic::Request<super::ProtoBackupReq>,
        ) -> Result<tonic::Response<super::ProtoBackupResult>, tonic::Status>;
        #[doc = " Leader -> subscriber member. One-way in spirit: the ack carries no information."]
        async fn records(
            &self,
            request: tonic::Request<super::ProtoRecordsReq>,
        ) -> Result<tonic::Response<super::ProtoRecordsAck>, tonic::Status>;
    }
    #[doc = " Peer-to-peer traffic of a partition. Client requests (append, consume, sessions) are served"]
    #[doc = " in-process by the library and never cross this service."]
    #[derive(Debug)]
    pub struct GrpcLogPeerServer<T: GrpcLogPeer> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcLogPeer> GrpcLogPeerServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcLogPeerServer<T>
    where
        T: GrpcLogPeer,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/distlog.GrpcLogPeer/Backup" => {
                    #[allow(non_camel_case_types)]
                    struct BackupSvc<T: GrpcLogPeer>(pub Arc<T>);
                    impl<T: GrpcLogPeer> tonic::server::UnaryService<super::ProtoBackupReq> for BackupSvc<T> {
                        type Response = super::ProtoBackupResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoBackupReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).backup(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = BackupSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/distlog.GrpcLogPeer/Records" => {
                    #[allow(non_camel_case_types)]
                    struct RecordsSvc<T: GrpcLogPeer>(pub Arc<T>);
                    impl<T: GrpcLogPeer> tonic::server::UnaryService<super::ProtoRecordsReq> for RecordsSvc<T> {
                        type Response = super::ProtoRecordsAck;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRecordsReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).records(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = RecordsSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcLogPeer> Clone for GrpcLogPeerServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcLogPeer> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcLogPeer> tonic::transport::NamedService for GrpcLogPeerServer<T> {
        const NAME: &'static str = "distlog.GrpcLogPeer";
    }
}

mod actor;
mod api;
mod commitlog;
mod partition;
mod server;
mod session;
mod transport;
mod grpc {
    include!("../generated/distlog.rs");
}

pub use api::try_create_partition;
pub use api::AppendError;
pub use api::AppendInput;
pub use api::AppendOutput;
pub use api::ConsumeError;
pub use api::ConsumeInput;
pub use api::DistributedLog;
pub use api::LeaderInfo;
pub use api::MemberInfo;
pub use api::PartitionClient;
pub use api::PartitionConfig;
pub use api::PartitionControl;
pub use api::PartitionCreationError;
pub use api::PartitionExited;
pub use api::PartitionOptions;
pub use api::ReceivedRecord;
pub use api::RecordStream;
pub use api::RoleEvent;
pub use api::RoleEventListener;
pub use api::RoleTransition;
pub use api::SessionError;
pub use api::SessionService;
pub use api::Subscriber;
pub use api::TransitionError;
pub use api::TransportConfig;
pub use partition::AckPolicy;
pub use partition::Protocol;
pub use partition::ReplicationError;
pub use partition::ReplicationStrategy;
pub use session::OpenSessionRequest;
pub use session::Session;
pub use session::SessionId;
pub use session::SessionValidationError;
pub use transport::LocalNetwork;

// Learning 1: `create::{root_mod}` should not have any code. Just `mod` and `pub use` statements.
// Learning 2: All `mod` statements, anywhere, should not be `pub`. Only export `pub` via individual
//             use statements.
//
// This keeps the `crate::{root_mod}` root_mod only responsible for exporting types to the rest of
// crate, and allows me to organize my root_mod impl however I want.

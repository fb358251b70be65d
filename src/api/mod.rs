//! This mod is meant to hold most of the code for the library's client-facing API.
mod client;
mod control;
mod distributed_log;
mod event_bus;
mod options;
mod session_service;
mod subscriber;
mod types;
mod wiring;

pub use client::PartitionClient;
pub use control::PartitionControl;
pub use control::RoleTransition;
pub use control::TransitionError;
pub use distributed_log::AppendError;
pub use distributed_log::AppendInput;
pub use distributed_log::AppendOutput;
pub use distributed_log::ConsumeError;
pub use distributed_log::ConsumeInput;
pub use distributed_log::DistributedLog;
pub use event_bus::RoleEvent;
pub use event_bus::RoleEventListener;
pub use options::PartitionOptions;
pub use session_service::SessionError;
pub use session_service::SessionService;
pub use subscriber::ReceivedRecord;
pub use subscriber::RecordStream;
pub use subscriber::Subscriber;
pub use types::LeaderInfo;
pub use types::MemberInfo;
pub use types::PartitionExited;
pub use wiring::try_create_partition;
pub use wiring::PartitionConfig;
pub use wiring::PartitionCreationError;
pub use wiring::TransportConfig;

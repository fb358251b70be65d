use crate::actor::ActorExited;
use crate::partition::{LeaderRedirectInfo, MemberId, MemberMetadata};
use std::net::Ipv4Addr;

#[derive(Clone, Debug)]
pub struct MemberInfo {
    pub member_id: String,
    pub ip_addr: Ipv4Addr,
    /// Port of the member's peer gRPC server. Unused with the local transport.
    pub port: u16,
}

impl From<MemberInfo> for MemberMetadata {
    fn from(member_info: MemberInfo) -> Self {
        Self::new(MemberId::new(member_info.member_id), member_info.ip_addr, member_info.port)
    }
}

/// Where to send requests instead, returned when a request reached a member that isn't leader.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderInfo {
    pub member_id: String,
    pub ip_addr: Ipv4Addr,
    pub port: u16,
}

impl From<LeaderRedirectInfo> for LeaderInfo {
    fn from(internal_leader: LeaderRedirectInfo) -> Self {
        Self {
            member_id: internal_leader.member_id.into_inner(),
            ip_addr: internal_leader.ip_addr,
            port: internal_leader.port,
        }
    }
}

// Partition logic runs on a background task. This error is returned if the task has exited.
#[derive(Debug, thiserror::Error)]
#[error("Partition task has exited")]
pub struct PartitionExited;

impl From<ActorExited> for PartitionExited {
    fn from(_: ActorExited) -> Self {
        PartitionExited
    }
}

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// MemberId identifies one server of the partition. It is also the identity subscribers use when
/// asking a leader to stream records to them.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct MemberId(String);

impl MemberId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        MemberId(id.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemberMetadata {
    member_id: MemberId,
    ip_addr: Ipv4Addr,
    port: u16,
}

impl MemberMetadata {
    pub(crate) fn new(member_id: MemberId, ip_addr: Ipv4Addr, port: u16) -> Self {
        MemberMetadata {
            member_id,
            ip_addr,
            port,
        }
    }

    pub(crate) fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub(crate) fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip_addr, self.port))
    }
}

/// Where a client should go instead, when it reached a member that isn't leader.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LeaderRedirectInfo {
    pub(crate) member_id: MemberId,
    pub(crate) ip_addr: Ipv4Addr,
    pub(crate) port: u16,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MembersError {
    #[error("Member {0:?} is listed more than once")]
    DuplicateMember(MemberId),
    #[error("My member ID is not in the member list")]
    MeNotInCluster,
}

/// Members is the static membership view of a partition.
pub(crate) struct Members {
    my_member_id: MemberId,
    members: HashMap<MemberId, MemberMetadata>,
}

impl Members {
    pub(crate) fn new(my_member_id: MemberId, all_members: Vec<MemberMetadata>) -> Result<Self, MembersError> {
        let mut members = HashMap::with_capacity(all_members.len());
        for member in all_members {
            let member_id = member.member_id.clone();
            if members.insert(member_id.clone(), member).is_some() {
                return Err(MembersError::DuplicateMember(member_id));
            }
        }

        if !members.contains_key(&my_member_id) {
            return Err(MembersError::MeNotInCluster);
        }

        Ok(Members { my_member_id, members })
    }

    pub(crate) fn my_member_id(&self) -> &MemberId {
        &self.my_member_id
    }

    pub(crate) fn contains(&self, member_id: &MemberId) -> bool {
        self.members.contains_key(member_id)
    }

    pub(crate) fn metadata(&self, member_id: &MemberId) -> Option<&MemberMetadata> {
        self.members.get(member_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &MemberMetadata> {
        self.members.values()
    }

    /// Everyone except me, sorted so iteration order is stable.
    pub(crate) fn peer_ids(&self) -> Vec<MemberId> {
        let mut peer_ids: Vec<_> = self
            .members
            .keys()
            .filter(|member_id| **member_id != self.my_member_id)
            .cloned()
            .collect();
        peer_ids.sort();

        peer_ids
    }

    pub(crate) fn redirect_info(&self, member_id: &MemberId) -> Option<LeaderRedirectInfo> {
        self.members.get(member_id).map(|member| LeaderRedirectInfo {
            member_id: member.member_id.clone(),
            ip_addr: member.ip_addr,
            port: member.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, port: u16) -> MemberMetadata {
        MemberMetadata::new(MemberId::new(id), Ipv4Addr::LOCALHOST, port)
    }

    #[test]
    fn peers_exclude_me_and_are_sorted() {
        let members = Members::new(
            MemberId::new("b"),
            vec![member("c", 3), member("a", 1), member("b", 2)],
        )
        .unwrap();

        assert_eq!(members.peer_ids(), vec![MemberId::new("a"), MemberId::new("c")]);
        assert!(members.contains(&MemberId::new("b")));
        assert_eq!(
            members.redirect_info(&MemberId::new("c")),
            Some(LeaderRedirectInfo {
                member_id: MemberId::new("c"),
                ip_addr: Ipv4Addr::LOCALHOST,
                port: 3,
            })
        );
    }

    #[test]
    fn rejects_duplicates_and_missing_self() {
        let result = Members::new(MemberId::new("a"), vec![member("a", 1), member("a", 2)]);
        assert!(matches!(result, Err(MembersError::DuplicateMember(_))));

        let result = Members::new(MemberId::new("z"), vec![member("a", 1)]);
        assert!(matches!(result, Err(MembersError::MeNotInCluster)));
    }
}

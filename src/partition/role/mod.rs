mod leader;
mod passive;
mod state_change_listener;

use crate::partition::{MemberId, Term};

pub(crate) use leader::LeaderConfig;
pub(crate) use leader::LeaderRole;
pub(crate) use passive::PassiveRole;
pub(crate) use state_change_listener::new as new_role_change_channel;
pub(crate) use state_change_listener::RoleChangeListener;
pub(crate) use state_change_listener::RoleChangeNotifier;
pub(crate) use state_change_listener::RoleSnapshot;

/// Role is what the partition currently does. Exactly one is active at a time; a new role is
/// built only after the old one was closed.
pub(crate) enum Role {
    Follower(PassiveRole),
    Candidate(CandidateRole),
    Leader(LeaderRole),
    Backup(PassiveRole),
    Closed,
}

/// CandidateRole waits for an election outcome. It neither leads nor accepts operations.
pub(crate) struct CandidateRole {
    term: Term,
}

impl CandidateRole {
    pub(crate) fn new(term: Term) -> Self {
        CandidateRole { term }
    }
}

impl Role {
    pub(crate) fn snapshot(&self) -> RoleSnapshot {
        match self {
            Role::Leader(leader) => RoleSnapshot::Leader { term: leader.term() },
            Role::Candidate(candidate) => RoleSnapshot::Candidate { term: candidate.term },
            Role::Follower(follower) => RoleSnapshot::Follower {
                term: follower.term(),
                leader: follower.leader().cloned(),
            },
            Role::Backup(backup) => RoleSnapshot::Backup {
                term: backup.term(),
                leader: backup.leader().cloned(),
            },
            Role::Closed => RoleSnapshot::Closed,
        }
    }

    /// Who a client should talk to instead of us, if we know.
    pub(crate) fn known_leader(&self) -> Option<&MemberId> {
        match self {
            Role::Follower(passive) | Role::Backup(passive) => passive.leader(),
            Role::Leader(_) | Role::Candidate(_) | Role::Closed => None,
        }
    }

    /// Releases everything the role holds. Closing twice is harmless.
    pub(crate) fn close(&mut self) {
        if let Role::Leader(leader) = self {
            leader.close();
        }
    }
}

use crate::partition::{RoleChangeListener, RoleSnapshot};

/// The role this member currently plays in the partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoleEvent {
    Leader { term: u64 },
    Candidate { term: u64 },
    Follower { term: u64, leader: Option<String> },
    Backup { term: u64, leader: Option<String> },
    Closed,
}

/// RoleEventListener observes role changes of the local partition. Consuming it is subtle: it
/// doesn't queue intermediate roles. Changes that happen between two calls to `next_event()`
/// are clobbered into the most recent one.
#[derive(Clone)]
pub struct RoleEventListener {
    role_change_listener: RoleChangeListener,
}

impl RoleEventListener {
    pub(crate) fn new(role_change_listener: RoleChangeListener) -> Self {
        RoleEventListener { role_change_listener }
    }

    /// Waits for the next role change. Returns None once the partition task is gone.
    pub async fn next_event(&mut self) -> Option<RoleEvent> {
        self.role_change_listener.next().await.map(RoleEvent::from)
    }

    pub fn current(&self) -> RoleEvent {
        RoleEvent::from(self.role_change_listener.current())
    }
}

// ------- Conversions --------

impl From<RoleSnapshot> for RoleEvent {
    fn from(snapshot: RoleSnapshot) -> Self {
        match snapshot {
            RoleSnapshot::Leader { term } => RoleEvent::Leader { term: term.as_u64() },
            RoleSnapshot::Candidate { term } => RoleEvent::Candidate { term: term.as_u64() },
            RoleSnapshot::Follower { term, leader } => RoleEvent::Follower {
                term: term.as_u64(),
                leader: leader.map(|member_id| member_id.into_inner()),
            },
            RoleSnapshot::Backup { term, leader } => RoleEvent::Backup {
                term: term.as_u64(),
                leader: leader.map(|member_id| member_id.into_inner()),
            },
            RoleSnapshot::Closed => RoleEvent::Closed,
        }
    }
}

use crate::partition::{MemberId, Term};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RoleSnapshot {
    Leader { term: Term },
    Candidate { term: Term },
    Follower { term: Term, leader: Option<MemberId> },
    Backup { term: Term, leader: Option<MemberId> },
    Closed,
}

pub(crate) fn new(initial_role: RoleSnapshot) -> (RoleChangeNotifier, RoleChangeListener) {
    let (snd, rcv) = watch::channel(initial_role);

    (RoleChangeNotifier { snd }, RoleChangeListener { rcv })
}

pub(crate) struct RoleChangeNotifier {
    snd: watch::Sender<RoleSnapshot>,
}

impl RoleChangeNotifier {
    pub(crate) fn notify_new_role(&self, new_role: RoleSnapshot) {
        let _ = self.snd.send(new_role);
    }
}

#[derive(Clone)]
pub(crate) struct RoleChangeListener {
    rcv: watch::Receiver<RoleSnapshot>,
}

impl RoleChangeListener {
    /// Waits for the next role change. Returns None once the partition is gone. Changes that
    /// happen in quick succession may be coalesced into the latest one.
    pub(crate) async fn next(&mut self) -> Option<RoleSnapshot> {
        match self.rcv.changed().await {
            Ok(_) => Some(self.rcv.borrow().clone()),
            Err(_) => None,
        }
    }

    pub(crate) fn current(&self) -> RoleSnapshot {
        self.rcv.borrow().clone()
    }
}

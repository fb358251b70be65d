use crate::actor::ActorClient;
use crate::api::types::LeaderInfo;
use crate::partition;
use crate::session::{OpenSessionRequest, Session, SessionId, SessionRegistry, SessionValidationError};

/// SessionService manages client sessions. Changes go through the leader; reads are served from
/// this member's registry in any role.
#[derive(Clone)]
pub struct SessionService {
    actor_client: ActorClient,
    sessions: SessionRegistry,
}

impl SessionService {
    pub(crate) fn new(actor_client: ActorClient, sessions: SessionRegistry) -> Self {
        SessionService { actor_client, sessions }
    }

    /// Validates the request and registers a session with a fresh id.
    pub async fn open_session(&self, request: OpenSessionRequest) -> Result<Session, SessionError> {
        self.actor_client
            .open_session(request)
            .await
            .map_err(SessionError::from)
    }

    /// Returns false if there was no such session.
    pub async fn close_session(&self, session_id: SessionId) -> Result<bool, SessionError> {
        self.actor_client
            .close_session(session_id)
            .await
            .map_err(SessionError::from)
    }

    /// Returns false if there was no such session.
    pub async fn keep_alive(&self, session_id: SessionId) -> Result<bool, SessionError> {
        self.actor_client
            .keep_alive(session_id)
            .await
            .map_err(SessionError::from)
    }

    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.sessions.get(session_id).map(|session| (*session).clone())
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions
            .list()
            .into_iter()
            .map(|session| (*session).clone())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid open session request: {0}")]
    Validation(SessionValidationError),

    #[error("I'm not leader")]
    NotLeader(Option<LeaderInfo>),

    #[error("Partition task has exited")]
    PartitionExited,
}

// ------- Conversions --------

impl From<partition::SessionError> for SessionError {
    fn from(internal_error: partition::SessionError) -> Self {
        match internal_error {
            partition::SessionError::Validation(e) => SessionError::Validation(e),
            partition::SessionError::NotLeader(leader) => SessionError::NotLeader(leader.map(LeaderInfo::from)),
            partition::SessionError::ActorExited => SessionError::PartitionExited,
        }
    }
}

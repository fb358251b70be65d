use std::fmt;
use std::time::Duration;

/// SessionId is assigned by the leader that opened the session. Ids are never reused by a leader.
#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Ord, Eq)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session is one client's interaction context with a named state machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    id: SessionId,
    client: String,
    name: String,
    state_machine: String,
    timeout: Duration,
}

impl Session {
    pub fn new(
        id: SessionId,
        client: impl Into<String>,
        name: impl Into<String>,
        state_machine: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Session {
            id,
            client: client.into(),
            name: name.into(),
            state_machine: state_machine.into(),
            timeout,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// Name of the state machine instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the state machine.
    pub fn state_machine(&self) -> &str {
        &self.state_machine
    }

    /// A session idle for longer than this is expired. Zero means never.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// OpenSessionRequest mirrors what arrives off the wire, so every field may be missing.
#[derive(Clone, Debug, Default)]
pub struct OpenSessionRequest {
    pub client: Option<String>,
    pub name: Option<String>,
    pub state_machine: Option<String>,
    pub timeout_millis: i64,
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum SessionValidationError {
    #[error("client must not be null")]
    MissingClient,
    #[error("name must not be null")]
    MissingName,
    #[error("stateMachine must not be null")]
    MissingStateMachine,
    #[error("timeout must be positive, got {0}ms")]
    NegativeTimeout(i64),
}

/// The fields of an open session request that passed validation. Only the id is missing.
#[derive(Debug)]
pub(crate) struct ValidatedOpenSession {
    client: String,
    name: String,
    state_machine: String,
    timeout: Duration,
}

impl OpenSessionRequest {
    pub(crate) fn validate(self) -> Result<ValidatedOpenSession, SessionValidationError> {
        let client = self.client.ok_or(SessionValidationError::MissingClient)?;
        let name = self.name.ok_or(SessionValidationError::MissingName)?;
        let state_machine = self.state_machine.ok_or(SessionValidationError::MissingStateMachine)?;
        if self.timeout_millis < 0 {
            return Err(SessionValidationError::NegativeTimeout(self.timeout_millis));
        }

        Ok(ValidatedOpenSession {
            client,
            name,
            state_machine,
            timeout: Duration::from_millis(self.timeout_millis as u64),
        })
    }
}

impl ValidatedOpenSession {
    pub(crate) fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            client: self.client,
            name: self.name,
            state_machine: self.state_machine,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> OpenSessionRequest {
        OpenSessionRequest {
            client: Some("client-1".into()),
            name: Some("counter".into()),
            state_machine: Some("AtomicCounter".into()),
            timeout_millis: 5_000,
        }
    }

    #[test]
    fn valid_request_becomes_session() {
        let session = valid_request().validate().unwrap().into_session(SessionId::new(9));

        assert_eq!(session.id(), SessionId::new(9));
        assert_eq!(session.client(), "client-1");
        assert_eq!(session.name(), "counter");
        assert_eq!(session.state_machine(), "AtomicCounter");
        assert_eq!(session.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_is_valid() {
        let request = OpenSessionRequest {
            timeout_millis: 0,
            ..valid_request()
        };

        assert!(request.validate().is_ok());
    }

    #[test]
    fn validation_failures() {
        let request = OpenSessionRequest {
            client: None,
            ..valid_request()
        };
        assert_eq!(request.validate().unwrap_err(), SessionValidationError::MissingClient);

        let request = OpenSessionRequest {
            name: None,
            ..valid_request()
        };
        assert_eq!(request.validate().unwrap_err(), SessionValidationError::MissingName);

        let request = OpenSessionRequest {
            state_machine: None,
            ..valid_request()
        };
        assert_eq!(request.validate().unwrap_err(), SessionValidationError::MissingStateMachine);

        let request = OpenSessionRequest {
            timeout_millis: -1,
            ..valid_request()
        };
        assert_eq!(request.validate().unwrap_err(), SessionValidationError::NegativeTimeout(-1));
    }
}

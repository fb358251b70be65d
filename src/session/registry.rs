use crate::session::{Session, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;

/// SessionRegistry tracks live sessions. It is the only partition state shared outside the
/// partition actor (the expiry timer sweeps it directly), hence the lock.
///
/// Writers are mutually exclusive. Readers see the state before or after any single write, never
/// part of one.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, RegisteredSession>>>,
}

struct RegisteredSession {
    session: Arc<Session>,
    last_keep_alive: Instant,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        SessionRegistry::default()
    }

    /// Insert `session`, replacing any session with the same id.
    pub(crate) fn register(&self, session: Session, now: Instant) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .expect("SessionRegistry.register() lock poison")
            .insert(
                session.id(),
                RegisteredSession {
                    session: session.clone(),
                    last_keep_alive: now,
                },
            );

        session
    }

    /// Returns true if the session was present.
    pub(crate) fn unregister(&self, id: SessionId) -> bool {
        self.sessions
            .write()
            .expect("SessionRegistry.unregister() lock poison")
            .remove(&id)
            .is_some()
    }

    pub(crate) fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .expect("SessionRegistry.get() lock poison")
            .get(&id)
            .map(|registered| registered.session.clone())
    }

    /// Snapshot of all live sessions, ordered by id.
    pub(crate) fn list(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .read()
            .expect("SessionRegistry.list() lock poison")
            .values()
            .map(|registered| registered.session.clone())
            .collect();
        sessions.sort_by_key(|session| session.id());

        sessions
    }

    pub(crate) fn contains(&self, id: SessionId) -> bool {
        self.sessions
            .read()
            .expect("SessionRegistry.contains() lock poison")
            .contains_key(&id)
    }

    pub(crate) fn max_id(&self) -> Option<SessionId> {
        self.sessions
            .read()
            .expect("SessionRegistry.max_id() lock poison")
            .keys()
            .max()
            .copied()
    }

    /// Returns true if the session was present.
    pub(crate) fn keep_alive(&self, id: SessionId, now: Instant) -> bool {
        match self
            .sessions
            .write()
            .expect("SessionRegistry.keep_alive() lock poison")
            .get_mut(&id)
        {
            Some(registered) => {
                registered.last_keep_alive = now;
                true
            }
            None => false,
        }
    }

    pub(crate) fn touch_all(&self, now: Instant) {
        for registered in self
            .sessions
            .write()
            .expect("SessionRegistry.touch_all() lock poison")
            .values_mut()
        {
            registered.last_keep_alive = now;
        }
    }

    /// Remove every session that has been idle for longer than its timeout. Sessions with a zero
    /// timeout never expire.
    pub(crate) fn expire(&self, now: Instant) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().expect("SessionRegistry.expire() lock poison");

        let expired: Vec<_> = sessions
            .values()
            .filter(|registered| {
                let timeout = registered.session.timeout();
                timeout.as_nanos() > 0 && now.saturating_duration_since(registered.last_keep_alive) > timeout
            })
            .map(|registered| registered.session.id())
            .collect();
        for id in expired.iter() {
            sessions.remove(id);
        }

        expired
    }

    pub(crate) fn clear(&self) {
        self.sessions.write().expect("SessionRegistry.clear() lock poison").clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.read().expect("SessionRegistry.len() lock poison").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn session(id: u64, timeout_millis: u64) -> Session {
        Session::new(
            SessionId::new(id),
            format!("client-{}", id),
            "map",
            "AtomicMap",
            Duration::from_millis(timeout_millis),
        )
    }

    #[test]
    fn register_get_unregister() {
        let registry = SessionRegistry::new();
        let now = Instant::now();

        registry.register(session(1, 100), now);
        assert_eq!(registry.get(SessionId::new(1)).as_deref(), Some(&session(1, 100)));

        assert!(registry.unregister(SessionId::new(1)));
        assert!(registry.get(SessionId::new(1)).is_none());

        // Unknown id is not an error.
        assert!(!registry.unregister(SessionId::new(1)));
        assert!(registry.get(SessionId::new(42)).is_none());
    }

    #[test]
    fn distinct_ids_do_not_overwrite_each_other() {
        let registry = SessionRegistry::new();
        let now = Instant::now();

        registry.register(session(1, 100), now);
        registry.register(session(2, 200), now);

        let listed: Vec<_> = registry.list().iter().map(|s| s.as_ref().clone()).collect();
        assert_eq!(listed, vec![session(1, 100), session(2, 200)]);
        assert_eq!(registry.max_id(), Some(SessionId::new(2)));
    }

    #[test]
    fn re_registering_same_id_overwrites() {
        let registry = SessionRegistry::new();
        let now = Instant::now();

        registry.register(session(1, 100), now);
        registry.register(session(1, 999), now);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(SessionId::new(1)).unwrap().timeout(), Duration::from_millis(999));
    }

    #[test]
    fn list_is_a_snapshot() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        registry.register(session(1, 100), now);

        let snapshot = registry.list();
        registry.unregister(SessionId::new(1));
        registry.register(session(2, 100), now);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), SessionId::new(1));
    }

    #[test]
    fn expire_respects_keep_alive_and_zero_timeout() {
        let registry = SessionRegistry::new();
        let t0 = Instant::now();
        registry.register(session(1, 100), t0);
        registry.register(session(2, 100), t0);
        registry.register(session(3, 0), t0);

        assert!(registry.keep_alive(SessionId::new(2), t0 + Duration::from_millis(80)));
        assert!(!registry.keep_alive(SessionId::new(7), t0));

        let expired = registry.expire(t0 + Duration::from_millis(150));

        assert_eq!(expired, vec![SessionId::new(1)]);
        assert!(registry.contains(SessionId::new(2)));
        assert!(registry.contains(SessionId::new(3)));

        registry.touch_all(t0 + Duration::from_millis(1_000));
        assert!(registry.expire(t0 + Duration::from_millis(1_050)).is_empty());
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let registry = SessionRegistry::new();
        let now = Instant::now();

        let writers: Vec<_> = (0..4u64)
            .map(|w| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..250u64 {
                        registry.register(session(w * 1_000 + i, 100), now);
                    }
                })
            })
            .collect();
        let reader = {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    for s in registry.list() {
                        // A listed session is always whole.
                        assert_eq!(s.client(), format!("client-{}", s.id().as_u64()));
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(registry.len(), 1_000);
    }
}

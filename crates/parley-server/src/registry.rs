//! Session registry.
//!
//! Maps session keys to live sessions. The map lock is held only to insert,
//! look up or remove an entry; work on a session happens under that
//! session's own lock, so clients never wait on each other here.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    gateway::GatewayError,
    session::{Session, SessionId},
};

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions keyed by [`SessionId`].
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create a registry admitting at most `max_sessions` concurrent sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_sessions }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        // Entries are inserted or removed whole; a poisoned map is still
        // consistent.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new unauthenticated session under a fresh random key.
    pub fn open(&self) -> Result<SessionId, GatewayError> {
        let mut sessions = self.lock();
        if sessions.len() >= self.max_sessions {
            return Err(GatewayError::TooManySessions { max: self.max_sessions });
        }

        let id = loop {
            let candidate = random_session_id()?;
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        sessions.insert(id, Arc::new(Mutex::new(Session::new(id))));
        Ok(id)
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Result<SessionHandle, GatewayError> {
        self.lock().get(&id).cloned().ok_or(GatewayError::SessionNotFound(id))
    }

    /// Drop a session. Returns false if it was already gone.
    pub fn close(&self, id: SessionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn random_session_id() -> Result<SessionId, GatewayError> {
    let mut buf = [0u8; 8];
    getrandom::fill(&mut buf).map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(SessionId::from_raw(u64::from_le_bytes(buf)))
}

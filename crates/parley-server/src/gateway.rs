//! Session gateway.
//!
//! Bridges stateless polling clients to the shared [`MessageStore`]. The
//! gateway owns the session registry and a clock; the store is handed in at
//! construction so several gateways (or tests) can share one log.
//!
//! ## Responsibilities
//!
//! - Session lifecycle: open, look up, close
//! - Onboarding: `set_username` moves a session to `Active`
//! - Posting policy: authentication, body limits, per-session cooldown
//! - Reads: pass-through to the store, open to every session

use std::{
    sync::{Arc, MutexGuard, PoisonError},
    time::Duration,
};

use parley_core::{Clock, Message, MessageId, MessageStore, Storage, StoreError, ValidationError};
use parley_proto::ErrorKind;

use crate::{
    registry::{SessionHandle, SessionRegistry},
    session::{Session, SessionId},
};

/// Default refresh cadence advertised to clients.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default display name limit, in characters.
pub const DEFAULT_MAX_USERNAME_CHARS: usize = 64;

/// Gateway limits and cadence.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Interval clients are told to poll at.
    pub poll_interval: Duration,
    /// Longest accepted display name, in characters.
    pub max_username_chars: usize,
    /// Longest accepted body, in characters. `None` disables the check.
    pub max_body_chars: Option<usize>,
    /// Minimum time between two posts from one session. Zero disables it.
    pub post_cooldown: Duration,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_username_chars: DEFAULT_MAX_USERNAME_CHARS,
            max_body_chars: None,
            post_cooldown: Duration::ZERO,
            max_sessions: 10_000,
        }
    }
}

/// Errors from gateway operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Post attempted before a display name was chosen.
    #[error("choose a username before posting")]
    NotAuthenticated,

    /// Input rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Display name already chosen for this session.
    #[error("already active as {username}")]
    AlreadyActive {
        /// Name the session is active under.
        username: String,
    },

    /// Posted within the cooldown window.
    #[error("posting too quickly; retry in {}ms", retry_after.as_millis())]
    RateLimited {
        /// Time left until the next post is accepted.
        retry_after: Duration,
    },

    /// Storage failed; nothing was written.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// Description of the storage failure.
        reason: String,
    },

    /// No session under this key.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session capacity reached.
    #[error("too many sessions (max {max})")]
    TooManySessions {
        /// Configured limit.
        max: usize,
    },

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => Self::Validation(e),
            StoreError::StorageUnavailable { reason } => Self::StorageUnavailable { reason },
        }
    }
}

impl GatewayError {
    /// Wire category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::Validation(_) | Self::AlreadyActive { .. } => ErrorKind::Validation,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Self::SessionNotFound(_) | Self::TooManySessions { .. } | Self::Internal(_) => {
                ErrorKind::Protocol
            },
        }
    }

    /// Returns true if the same call may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Per-client front door to the message store.
#[derive(Debug)]
pub struct Gateway<S, C> {
    store: Arc<MessageStore<S>>,
    clock: C,
    sessions: SessionRegistry,
    config: GatewayConfig,
}

fn lock(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    // Session mutations are single assignments; poisoning cannot tear them.
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: Storage, C: Clock> Gateway<S, C> {
    /// Create a gateway over a shared store.
    pub fn new(store: Arc<MessageStore<S>>, clock: C, config: GatewayConfig) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions);
        Self { store, clock, sessions, config }
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<MessageStore<S>> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Start a new, unauthenticated session.
    pub fn open_session(&self) -> Result<SessionId, GatewayError> {
        let id = self.sessions.open()?;
        tracing::debug!(session = %id, "session opened");
        Ok(id)
    }

    /// End a session (logout or disconnect). Returns false if unknown.
    pub fn close_session(&self, session: SessionId) -> bool {
        let closed = self.sessions.close(session);
        if closed {
            tracing::debug!(session = %session, "session closed");
        }
        closed
    }

    /// Display name of an active session.
    pub fn username(&self, session: SessionId) -> Result<Option<String>, GatewayError> {
        let handle = self.sessions.get(session)?;
        let username = lock(&handle).username().map(str::to_string);
        Ok(username)
    }

    /// Choose the session's display name; returns it as stored.
    pub fn set_username(&self, session: SessionId, name: &str) -> Result<String, GatewayError> {
        let handle = self.sessions.get(session)?;
        let result = lock(&handle).set_username(name, self.config.max_username_chars);

        if let Ok(username) = &result {
            tracing::info!(session = %session, username = %username, "session active");
        }
        result
    }

    /// Post `body` under the session's display name.
    ///
    /// Fails with `NotAuthenticated` before `set_username`; writes nothing on
    /// any error.
    pub fn post(&self, session: SessionId, body: &str) -> Result<Message, GatewayError> {
        let handle = self.sessions.get(session)?;
        let mut session_state = lock(&handle);
        let author = session_state.author()?.to_string();

        if body.is_empty() {
            return Err(ValidationError::EmptyBody.into());
        }
        if let Some(max) = self.config.max_body_chars {
            let len = body.chars().count();
            if len > max {
                return Err(ValidationError::BodyTooLong { len, max }.into());
            }
        }

        let now = self.clock.now();
        session_state.check_cooldown(now, self.config.post_cooldown)?;

        let message = self.store.append(&author, body, &self.clock)?;
        session_state.record_post(now);
        drop(session_state);

        tracing::debug!(session = %session, id = message.id, "message posted");
        Ok(message)
    }

    /// Full transcript, ascending by id.
    pub fn poll(&self, session: SessionId) -> Result<Vec<Message>, GatewayError> {
        self.sessions.get(session)?;
        Ok(self.store.read_all()?)
    }

    /// Messages committed after `after`, ascending.
    pub fn poll_since(
        &self,
        session: SessionId,
        after: MessageId,
    ) -> Result<Vec<Message>, GatewayError> {
        self.sessions.get(session)?;
        Ok(self.store.read_since(after)?)
    }

    /// The last `limit` messages, ascending.
    pub fn poll_recent(
        &self,
        session: SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        self.sessions.get(session)?;
        Ok(self.store.read_recent(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use parley_core::{ManualClock, MemoryStorage};

    use super::*;

    fn gateway(config: GatewayConfig) -> Gateway<MemoryStorage, ManualClock> {
        let store = Arc::new(MessageStore::new(MemoryStorage::new()));
        Gateway::new(store, ManualClock::at_epoch(), config)
    }

    #[test]
    fn error_kinds_map_onto_taxonomy() {
        assert_eq!(GatewayError::NotAuthenticated.kind(), ErrorKind::NotAuthenticated);
        assert_eq!(
            GatewayError::Validation(ValidationError::EmptyBody).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            GatewayError::StorageUnavailable { reason: "down".to_string() }.kind(),
            ErrorKind::StorageUnavailable
        );
        assert_eq!(
            GatewayError::RateLimited { retry_after: Duration::from_secs(1) }.kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            GatewayError::SessionNotFound(SessionId::from_raw(1)).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn store_errors_convert() {
        let err: GatewayError = StoreError::Validation(ValidationError::EmptyUsername).into();
        assert_eq!(err, GatewayError::Validation(ValidationError::EmptyUsername));

        let err: GatewayError =
            StoreError::StorageUnavailable { reason: "busy".to_string() }.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_body_rejected() {
        let gateway = gateway(GatewayConfig::default());
        let session = gateway.open_session().unwrap();
        gateway.set_username(session, "alice").unwrap();

        let result = gateway.post(session, "");
        assert_eq!(result, Err(GatewayError::Validation(ValidationError::EmptyBody)));
        assert_eq!(gateway.store().count().unwrap(), 0);
    }

    #[test]
    fn whitespace_only_body_accepted() {
        let gateway = gateway(GatewayConfig::default());
        let session = gateway.open_session().unwrap();
        gateway.set_username(session, "alice").unwrap();

        let message = gateway.post(session, " \t\n").unwrap();
        assert_eq!(message.id, 1);
        assert_eq!(message.body, " \t\n");
        assert_eq!(gateway.store().count().unwrap(), 1);
    }

    #[test]
    fn body_limit_enforced_when_configured() {
        let gateway = gateway(GatewayConfig { max_body_chars: Some(5), ..Default::default() });
        let session = gateway.open_session().unwrap();
        gateway.set_username(session, "alice").unwrap();

        assert!(gateway.post(session, "12345").is_ok());
        assert_eq!(
            gateway.post(session, "123456"),
            Err(GatewayError::Validation(ValidationError::BodyTooLong { len: 6, max: 5 }))
        );
        assert_eq!(gateway.store().count().unwrap(), 1);
    }

    #[test]
    fn unknown_session_is_rejected() {
        let gateway = gateway(GatewayConfig::default());
        let ghost = SessionId::from_raw(42);

        assert_eq!(gateway.post(ghost, "hi"), Err(GatewayError::SessionNotFound(ghost)));
        assert_eq!(gateway.poll(ghost), Err(GatewayError::SessionNotFound(ghost)));
        assert!(!gateway.close_session(ghost));
    }

    #[test]
    fn body_is_stored_verbatim() {
        let gateway = gateway(GatewayConfig::default());
        let session = gateway.open_session().unwrap();
        gateway.set_username(session, "alice").unwrap();

        let message = gateway.post(session, "  spaced out  ").unwrap();
        assert_eq!(message.body, "  spaced out  ");
    }
}

//! Per-client session state machine.
//!
//! ```text
//!                 set_username(valid)
//!  Unauthenticated ───────────────────▶ Active { username }
//!        │  ▲                                   │
//!        └──┘ set_username(invalid)             └─ terminal until the
//!                                                  session is dropped
//! ```
//!
//! Pure state: no I/O, no clock reads. The gateway supplies times.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use parley_core::ValidationError;

use crate::gateway::GatewayError;

/// Opaque key addressing one client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw key.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw key.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No display name yet; may read, may not post.
    Unauthenticated,
    /// Display name chosen.
    Active {
        /// Name attached to every post from this session.
        username: String,
    },
}

/// One connected client.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    last_post_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh, unauthenticated session.
    pub fn new(id: SessionId) -> Self {
        Self { id, state: SessionState::Unauthenticated, last_post_at: None }
    }

    /// Session key.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Display name, once active.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { username } => Some(username),
            SessionState::Unauthenticated => None,
        }
    }

    /// Choose the display name.
    ///
    /// The name is kept exactly as given; only the empty string is refused.
    /// On error the session stays `Unauthenticated`.
    pub fn set_username(&mut self, name: &str, max_chars: usize) -> Result<String, GatewayError> {
        if let SessionState::Active { username } = &self.state {
            return Err(GatewayError::AlreadyActive { username: username.clone() });
        }

        if name.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        let len = name.chars().count();
        if len > max_chars {
            return Err(ValidationError::UsernameTooLong { len, max: max_chars }.into());
        }

        self.state = SessionState::Active { username: name.to_string() };
        Ok(name.to_string())
    }

    /// Name to post under, or `NotAuthenticated`.
    pub fn author(&self) -> Result<&str, GatewayError> {
        self.username().ok_or(GatewayError::NotAuthenticated)
    }

    /// Reject a post arriving within `cooldown` of the previous one.
    pub fn check_cooldown(
        &self,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<(), GatewayError> {
        let Some(last) = self.last_post_at else {
            return Ok(());
        };

        // A clock that stepped back counts as no time elapsed.
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < cooldown {
            return Err(GatewayError::RateLimited { retry_after: cooldown - elapsed });
        }
        Ok(())
    }

    /// Note a successful post.
    pub fn record_post(&mut self, at: DateTime<Utc>) {
        self.last_post_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn session() -> Session {
        Session::new(SessionId::from_raw(1))
    }

    #[test]
    fn starts_unauthenticated() {
        let session = session();
        assert_eq!(session.state(), &SessionState::Unauthenticated);
        assert!(matches!(session.author(), Err(GatewayError::NotAuthenticated)));
    }

    #[test]
    fn valid_name_activates() {
        let mut session = session();
        assert_eq!(session.set_username("alice", 64).unwrap(), "alice");
        assert_eq!(session.author().unwrap(), "alice");
    }

    #[test]
    fn name_is_stored_as_given() {
        let mut session = session();
        assert_eq!(session.set_username("  alice \n", 64).unwrap(), "  alice \n");
        assert_eq!(session.author().unwrap(), "  alice \n");
    }

    #[test]
    fn whitespace_name_activates() {
        let mut session = session();
        assert_eq!(session.set_username("   ", 64).unwrap(), "   ");
        assert_eq!(session.username(), Some("   "));
    }

    #[test]
    fn empty_name_keeps_session_unauthenticated() {
        let mut session = session();
        let result = session.set_username("", 64);
        assert!(matches!(result, Err(GatewayError::Validation(ValidationError::EmptyUsername))));

        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }

    #[test]
    fn overlong_name_rejected() {
        let mut session = session();
        let result = session.set_username("abcdef", 5);
        assert!(matches!(
            result,
            Err(GatewayError::Validation(ValidationError::UsernameTooLong { len: 6, max: 5 }))
        ));
        assert_eq!(session.username(), None);
    }

    #[test]
    fn name_limit_counts_characters_not_bytes() {
        let mut session = session();
        assert!(session.set_username("ñandú", 5).is_ok());
    }

    #[test]
    fn active_is_terminal() {
        let mut session = session();
        session.set_username("alice", 64).unwrap();

        let result = session.set_username("mallory", 64);
        assert!(matches!(
            result,
            Err(GatewayError::AlreadyActive { ref username }) if username == "alice"
        ));
        assert_eq!(session.username(), Some("alice"));
    }

    #[test]
    fn cooldown_blocks_then_allows() {
        let mut session = session();
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let cooldown = Duration::from_secs(3);

        assert!(session.check_cooldown(t0, cooldown).is_ok());
        session.record_post(t0);

        let result = session.check_cooldown(t0 + TimeDelta::seconds(1), cooldown);
        assert!(matches!(
            result,
            Err(GatewayError::RateLimited { retry_after }) if retry_after == Duration::from_secs(2)
        ));

        assert!(session.check_cooldown(t0 + TimeDelta::seconds(3), cooldown).is_ok());
    }

    #[test]
    fn zero_cooldown_never_limits() {
        let mut session = session();
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        session.record_post(t0);
        assert!(session.check_cooldown(t0, Duration::ZERO).is_ok());
    }

    #[test]
    fn clock_step_back_is_rate_limited_for_full_cooldown() {
        let mut session = session();
        let t0 = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(100);
        session.record_post(t0);

        let result = session.check_cooldown(t0 - TimeDelta::seconds(50), Duration::from_secs(3));
        assert!(matches!(
            result,
            Err(GatewayError::RateLimited { retry_after }) if retry_after == Duration::from_secs(3)
        ));
    }

    #[test]
    fn session_id_display_is_hex() {
        assert_eq!(SessionId::from_raw(0xab).to_string(), "00000000000000ab");
    }
}

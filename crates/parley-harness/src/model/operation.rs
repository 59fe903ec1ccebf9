//! Operations for model-based testing.
//!
//! Operations represent everything a client or the environment can do. They
//! are generated randomly by proptest (or from a seed by
//! [`crate::Workload`]) and applied to both the model and the real gateway.

use arbitrary::Arbitrary;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Client opens a session.
    Connect {
        /// Client connecting.
        client_id: ClientId,
    },

    /// Client closes its session.
    Disconnect {
        /// Client leaving.
        client_id: ClientId,
    },

    /// Client chooses a display name.
    SetUsername {
        /// Client choosing.
        client_id: ClientId,
        /// Requested name.
        name: SmallText,
    },

    /// Client posts a message.
    Post {
        /// Client posting.
        client_id: ClientId,
        /// Message body.
        body: SmallText,
    },

    /// Client fetches the full transcript.
    Poll {
        /// Client polling.
        client_id: ClientId,
    },

    /// Client fetches messages after an id.
    PollSince {
        /// Client polling.
        client_id: ClientId,
        /// Highest id the client claims to hold.
        after: u8,
    },

    /// Client fetches the newest messages.
    PollRecent {
        /// Client polling.
        client_id: ClientId,
        /// Window size.
        limit: u8,
    },

    /// Advance the clock.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Take storage down or bring it back.
    SetOutage {
        /// Whether storage fails every call.
        down: bool,
    },
}

impl Operation {
    /// Client this operation acts for, if any.
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Connect { client_id }
            | Self::Disconnect { client_id }
            | Self::SetUsername { client_id, .. }
            | Self::Post { client_id, .. }
            | Self::Poll { client_id }
            | Self::PollSince { client_id, .. }
            | Self::PollRecent { client_id, .. } => Some(*client_id),
            Self::AdvanceTime { .. } | Self::SetOutage { .. } => None,
        }
    }

    /// Same operation with its client id folded into `0..num_clients`.
    #[must_use]
    pub fn clamp_client(mut self, num_clients: usize) -> Self {
        let Ok(n) = u8::try_from(num_clients.clamp(1, usize::from(u8::MAX))) else {
            return self;
        };
        match &mut self {
            Self::Connect { client_id }
            | Self::Disconnect { client_id }
            | Self::SetUsername { client_id, .. }
            | Self::Post { client_id, .. }
            | Self::Poll { client_id }
            | Self::PollSince { client_id, .. }
            | Self::PollRecent { client_id, .. } => *client_id %= n,
            Self::AdvanceTime { .. } | Self::SetOutage { .. } => {},
        }
        self
    }
}

/// Compact text for names and bodies.
///
/// The size class picks an interesting shape: empty, whitespace only, a
/// space-padded word, or something long enough to trip length limits.
/// Only the empty shape is invalid regardless of configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallText {
    /// Content seed.
    pub seed: u8,
    /// Shape selector (taken modulo 4).
    pub size_class: u8,
}

impl SmallText {
    /// Expand to the actual string.
    pub fn to_text(self) -> String {
        match self.size_class % 4 {
            0 => String::new(),
            1 => " \t ".to_string(),
            2 => format!("  w{}  ", self.seed),
            _ => {
                let c = char::from(b'a' + self.seed % 26);
                std::iter::repeat_n(c, 70 + usize::from(self.seed % 8)).collect()
            },
        }
    }
}

/// Result of applying an operation.
///
/// Compared field by field between model and real system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded with nothing to report.
    Ok,
    /// Session is active under this name.
    Active(String),
    /// Message committed with this id.
    Posted(u64),
    /// Ids returned by a poll, in order.
    Transcript(Vec<u64>),
    /// Operation failed.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Client has no open session.
    NotConnected,
    /// Client already has an open session.
    AlreadyConnected,
    /// Post before choosing a name.
    NotAuthenticated,
    /// Name already chosen.
    AlreadyActive,
    /// Empty or oversized name or body.
    Validation,
    /// Posted within the cooldown.
    RateLimited,
    /// Storage is down.
    StorageUnavailable,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

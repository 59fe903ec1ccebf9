//! Request and response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Store-assigned sequence number (1-based, gap-free).
    pub id: u64,
    /// Display name of the sender at time of posting.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Store-assigned commit time.
    pub timestamp: DateTime<Utc>,
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Choose the display name for this connection's session.
    SetUsername {
        /// Requested display name.
        name: String,
    },

    /// Append a message under the session's display name.
    Post {
        /// Message text.
        body: String,
    },

    /// Fetch the full transcript.
    Poll,

    /// Fetch messages committed after `after_id`.
    PollSince {
        /// Highest id the client already holds.
        after_id: u64,
    },

    /// Fetch the last `limit` messages.
    PollRecent {
        /// Window size.
        limit: u32,
    },

    /// End the session; the server replies with [`Response::Goodbye`] and
    /// closes the connection.
    Goodbye,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The session is now active.
    ///
    /// `poll_interval_ms` is the refresh cadence the client is expected to
    /// poll at.
    Active {
        /// Display name exactly as stored.
        username: String,
        /// Recommended poll interval in milliseconds.
        poll_interval_ms: u64,
    },

    /// A post was committed.
    Posted {
        /// The committed message.
        message: WireMessage,
    },

    /// Messages ordered ascending by id.
    Transcript {
        /// Snapshot contents.
        messages: Vec<WireMessage>,
    },

    /// The request failed; the session is unchanged.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// Acknowledges [`Request::Goodbye`].
    Goodbye,
}

/// Error categories reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input rejected (empty or oversized name/body).
    Validation,
    /// Post attempted before a display name was chosen.
    NotAuthenticated,
    /// Storage failed; the request may be retried.
    StorageUnavailable,
    /// Posting too quickly; retry after the cooldown.
    RateLimited,
    /// Malformed request frame or server-side limit reached.
    Protocol,
}

impl ErrorKind {
    /// Whether the same request can succeed if simply sent again later.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::RateLimited)
    }
}

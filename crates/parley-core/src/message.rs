//! The chat message record.

use chrono::{DateTime, Utc};
use parley_proto::WireMessage;

/// Position of a message in the log. The first message is 1.
pub type MessageId = u64;

/// A committed chat message.
///
/// Produced by [`crate::MessageStore::append`] and never modified afterwards.
/// Storage backends rebuild these from their persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned, gap-free sequence number.
    pub id: MessageId,
    /// Sender's display name at time of posting.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Store-assigned commit time.
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            username: message.username,
            body: message.body,
            timestamp: message.timestamp,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        Self {
            id: message.id,
            username: message.username,
            body: message.body,
            timestamp: message.timestamp,
        }
    }
}

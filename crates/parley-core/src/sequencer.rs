//! Id and timestamp assignment.
//!
//! The sequencer tracks the tail of the log (last id, last timestamp) and
//! hands out the next position. It performs no I/O: [`MessageStore`] owns a
//! sequencer behind its append lock, syncs it from storage when the tail is
//! unknown, and advances it only after storage confirms the write.
//!
//! ## Invariants
//!
//! - `next` never returns an id that storage has not been asked to accept
//!   after the current tail, so a failed write leaves no gap.
//! - Timestamps handed out never decrease, even if the clock steps back.
//! - After any storage error the tail is forgotten and re-read, since the
//!   write may or may not have landed.
//!
//! [`MessageStore`]: crate::MessageStore

use chrono::{DateTime, Utc};

use crate::message::{Message, MessageId};

/// Tail position as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Not read from storage yet, or invalidated by a failure.
    Unknown,
    /// Storage holds no messages.
    Empty,
    /// Last committed message.
    At {
        id: MessageId,
        timestamp: DateTime<Utc>,
    },
}

/// Next position to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Id for the next message.
    pub id: MessageId,
    /// Timestamp for the next message.
    pub timestamp: DateTime<Utc>,
}

/// Errors from the sequencer.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// Tail must be synced from storage first.
    #[error("sequencer tail unknown; sync from storage first")]
    Unsynced,

    /// No ids left.
    #[error("message id space exhausted")]
    Exhausted,
}

/// Assigns gap-free ids and non-decreasing timestamps.
#[derive(Debug, Clone)]
pub struct Sequencer {
    tail: Tail,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Create a sequencer that does not yet know the tail.
    pub fn new() -> Self {
        Self { tail: Tail::Unknown }
    }

    /// Whether [`Sequencer::sync`] must run before [`Sequencer::next`].
    pub fn needs_sync(&self) -> bool {
        self.tail == Tail::Unknown
    }

    /// Adopt the tail as read from storage.
    pub fn sync(&mut self, latest: Option<&Message>) {
        self.tail = match latest {
            Some(message) => Tail::At { id: message.id, timestamp: message.timestamp },
            None => Tail::Empty,
        };
    }

    /// Id of the last committed message, if known.
    pub fn latest_id(&self) -> Option<MessageId> {
        match self.tail {
            Tail::At { id, .. } => Some(id),
            Tail::Unknown | Tail::Empty => None,
        }
    }

    /// Compute the slot for the next message.
    ///
    /// Does not change state; call [`Sequencer::advance`] once the message
    /// is durable.
    pub fn next(&self, now: DateTime<Utc>) -> Result<Slot, SequencerError> {
        match self.tail {
            Tail::Unknown => Err(SequencerError::Unsynced),
            Tail::Empty => Ok(Slot { id: 1, timestamp: now }),
            Tail::At { id, timestamp } => {
                let id = id.checked_add(1).ok_or(SequencerError::Exhausted)?;
                Ok(Slot { id, timestamp: now.max(timestamp) })
            },
        }
    }

    /// Record that `message` is committed.
    pub fn advance(&mut self, message: &Message) {
        self.tail = Tail::At { id: message.id, timestamp: message.timestamp };
    }

    /// Forget the tail after a failure of unknown outcome.
    pub fn invalidate(&mut self) {
        self.tail = Tail::Unknown;
    }
}

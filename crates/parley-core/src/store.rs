//! The message store.
//!
//! `MessageStore` is the single source of truth for the transcript. It is
//! shared by reference (`Arc<MessageStore<_>>`) between every client's
//! session; all coordination between concurrent callers happens in here.
//!
//! ## Concurrency
//!
//! - Appends serialize on one mutex that owns the [`Sequencer`]. Id and
//!   timestamp are assigned and the row is committed while it is held, so
//!   commit order, id order and timestamp order agree.
//! - Reads never take that mutex. Each read is one storage call, which the
//!   [`Storage`] contract makes a consistent snapshot: a concurrent append is
//!   either entirely visible or not at all.
//! - Validation runs before the mutex is taken, so rejected input never
//!   reserves an id.

use std::sync::{Mutex, PoisonError};

use crate::{
    clock::Clock,
    error::{StoreError, ValidationError},
    message::{Message, MessageId},
    sequencer::{Sequencer, SequencerError},
    storage::Storage,
};

/// Append-only, totally ordered chat log over a [`Storage`] backend.
#[derive(Debug)]
pub struct MessageStore<S> {
    storage: S,
    /// Append serialization point. Holds no data readers depend on.
    sequencer: Mutex<Sequencer>,
}

impl<S: Storage> MessageStore<S> {
    /// Wrap a backend. The tail is read lazily on the first append.
    pub fn new(storage: S) -> Self {
        Self { storage, sequencer: Mutex::new(Sequencer::new()) }
    }

    /// The underlying backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Append a message, assigning its id and timestamp.
    ///
    /// The timestamp comes from `clock`, clamped so it never precedes the
    /// previous message's. On any error nothing is written and no id is
    /// consumed.
    pub fn append<C: Clock>(
        &self,
        username: &str,
        body: &str,
        clock: &C,
    ) -> Result<Message, StoreError> {
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        if body.is_empty() {
            return Err(ValidationError::EmptyBody.into());
        }

        // A panic while holding the lock cannot leave the sequencer half
        // updated: every mutation is a single assignment.
        let mut sequencer = self.sequencer.lock().unwrap_or_else(PoisonError::into_inner);

        if sequencer.needs_sync() {
            let latest = self.storage.latest_message().inspect_err(|e| {
                tracing::error!("failed to read log tail: {}", e);
            })?;
            sequencer.sync(latest.as_ref());
            tracing::debug!(latest_id = ?sequencer.latest_id(), "sequencer synced");
        }

        let slot = sequencer.next(clock.now()).map_err(|e| match e {
            SequencerError::Unsynced | SequencerError::Exhausted => {
                StoreError::StorageUnavailable { reason: e.to_string() }
            },
        })?;

        let message = Message {
            id: slot.id,
            username: username.to_string(),
            body: body.to_string(),
            timestamp: slot.timestamp,
        };

        if let Err(e) = self.storage.store_message(&message) {
            // The write may have landed (lost acknowledgement) or another
            // writer may own the tail; re-read it next time.
            sequencer.invalidate();
            tracing::error!(id = message.id, "failed to persist message: {}", e);
            return Err(e.into());
        }

        sequencer.advance(&message);
        drop(sequencer);

        tracing::debug!(id = message.id, username = %message.username, "message appended");
        Ok(message)
    }

    /// Every committed message, ascending by id.
    pub fn read_all(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.storage.load_messages(0, None)?)
    }

    /// Committed messages with `id > after`, ascending.
    pub fn read_since(&self, after: MessageId) -> Result<Vec<Message>, StoreError> {
        Ok(self.storage.load_messages(after, None)?)
    }

    /// The last `limit` committed messages, ascending.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.storage.load_recent(limit)?)
    }

    /// Id of the newest committed message.
    pub fn latest_id(&self) -> Result<Option<MessageId>, StoreError> {
        Ok(self.storage.latest_message()?.map(|message| message.id))
    }

    /// Number of committed messages.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.storage.message_count()?)
    }
}

//! In-memory storage.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Storage, StorageError};
use crate::message::{Message, MessageId};

/// Log held in memory for the lifetime of the process.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MemoryStorage {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Message>>, StorageError> {
        self.messages.read().map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Message>>, StorageError> {
        self.messages.write().map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
    }
}

/// Index of the first message with `id > after`. Ids are 1-based and dense,
/// so that is simply `after`.
fn start_index(after: MessageId, len: usize) -> usize {
    usize::try_from(after).map_or(len, |after| after.min(len))
}

impl Storage for MemoryStorage {
    fn store_message(&self, message: &Message) -> Result<(), StorageError> {
        let mut messages = self.write()?;

        let expected = messages.last().map_or(1, |last| last.id + 1);
        if message.id != expected {
            return Err(StorageError::Conflict { expected, got: message.id });
        }

        messages.push(message.clone());
        Ok(())
    }

    fn latest_message(&self) -> Result<Option<Message>, StorageError> {
        Ok(self.read()?.last().cloned())
    }

    fn load_messages(
        &self,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError> {
        let messages = self.read()?;
        let start = start_index(after, messages.len());
        let tail = &messages[start..];
        let take = limit.unwrap_or(tail.len()).min(tail.len());
        Ok(tail[..take].to_vec())
    }

    fn load_recent(&self, limit: usize) -> Result<Vec<Message>, StorageError> {
        let messages = self.read()?;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.len())
    }
}

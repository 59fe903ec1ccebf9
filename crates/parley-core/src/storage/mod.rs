//! Message persistence.
//!
//! A [`Storage`] is a dumb, ordered record sink: it knows nothing about
//! clocks or validation, but it refuses any write that would break the
//! sequence (a record whose id is not exactly `latest + 1`). That check is
//! the database-level backstop behind the store's in-process serialization.
//!
//! Backends:
//!
//! - [`MemoryStorage`]: shared `Vec` behind a lock, for tests and ephemeral
//!   rooms.
//! - [`SqliteStorage`]: durable, WAL-journalled SQLite.
//! - [`ChaoticStorage`]: wraps another backend and injects failures.

mod chaotic;
mod memory;
mod sqlite;

use std::path::PathBuf;

pub use chaotic::{ChaoticStorage, FaultMode};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::message::{Message, MessageId};

/// Errors from storage backends.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend unreachable, busy past its timeout, or failed the I/O.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Write would leave a gap or duplicate in the id sequence.
    #[error("sequence conflict: expected id {expected}, got {got}")]
    Conflict {
        /// Id the backend would accept next.
        expected: MessageId,
        /// Id that was offered.
        got: MessageId,
    },

    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Ordered, append-only message persistence.
///
/// # Invariants
///
/// - `store_message` accepts only `id == latest + 1` (1 on an empty log) and
///   is atomic: after it returns `Ok` the record is durable and visible to
///   every subsequent load, after it returns `Err` the record is absent
///   (except for [`FaultMode::AfterWrite`], which models an ambiguous commit).
/// - Every load is served from a single consistent snapshot, ascending by id.
pub trait Storage: Send + Sync {
    /// Persist `message` as the new tail.
    fn store_message(&self, message: &Message) -> Result<(), StorageError>;

    /// Last committed message, if any.
    fn latest_message(&self) -> Result<Option<Message>, StorageError>;

    /// Messages with `id > after`, ascending, at most `limit` of them.
    fn load_messages(
        &self,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError>;

    /// The last `limit` messages, ascending.
    fn load_recent(&self, limit: usize) -> Result<Vec<Message>, StorageError>;

    /// Number of committed messages.
    fn message_count(&self) -> Result<usize, StorageError>;
}

/// Where the server keeps its log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Process-lifetime in-memory log.
    #[default]
    Memory,
    /// SQLite database file, created if missing.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
    },
}

impl StorageConfig {
    /// Open the configured backend.
    pub fn open(&self) -> Result<Backend, StorageError> {
        match self {
            Self::Memory => Ok(Backend::Memory(MemoryStorage::new())),
            Self::Sqlite { path } => SqliteStorage::open(path).map(Backend::Sqlite),
        }
    }
}

/// Backend chosen at runtime from a [`StorageConfig`].
#[derive(Debug, Clone)]
pub enum Backend {
    /// See [`MemoryStorage`].
    Memory(MemoryStorage),
    /// See [`SqliteStorage`].
    Sqlite(SqliteStorage),
}

impl Storage for Backend {
    fn store_message(&self, message: &Message) -> Result<(), StorageError> {
        match self {
            Self::Memory(s) => s.store_message(message),
            Self::Sqlite(s) => s.store_message(message),
        }
    }

    fn latest_message(&self) -> Result<Option<Message>, StorageError> {
        match self {
            Self::Memory(s) => s.latest_message(),
            Self::Sqlite(s) => s.latest_message(),
        }
    }

    fn load_messages(
        &self,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError> {
        match self {
            Self::Memory(s) => s.load_messages(after, limit),
            Self::Sqlite(s) => s.load_messages(after, limit),
        }
    }

    fn load_recent(&self, limit: usize) -> Result<Vec<Message>, StorageError> {
        match self {
            Self::Memory(s) => s.load_recent(limit),
            Self::Sqlite(s) => s.load_recent(limit),
        }
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        match self {
            Self::Memory(s) => s.message_count(),
            Self::Sqlite(s) => s.message_count(),
        }
    }
}

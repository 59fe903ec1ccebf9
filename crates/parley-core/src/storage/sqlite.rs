//! SQLite storage.
//!
//! One append-only table:
//!
//! ```text
//! messages(id INTEGER PRIMARY KEY, username TEXT, body TEXT, timestamp TEXT)
//! ```
//!
//! File databases run in WAL mode with `synchronous = FULL`, so a commit is
//! on disk before `store_message` returns, and readers see the last committed
//! snapshot without waiting on the writer. Reads go through their own
//! connection for that reason; an in-memory database has a single connection
//! shared by both roles.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::{Storage, StorageError};
use crate::message::{Message, MessageId};

/// How long a connection waits on a locked database before giving up with
/// `SQLITE_BUSY`, which surfaces as [`StorageError::Unavailable`].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, username, body, timestamp FROM messages";

/// Durable SQLite-backed log.
///
/// Clones share the same connections.
#[derive(Clone)]
pub struct SqliteStorage {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("shared_connection", &Arc::ptr_eq(&self.writer, &self.reader))
            .finish_non_exhaustive()
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        let writer = Connection::open(path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        let journal: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        writer.pragma_update(None, "synchronous", "FULL")?;
        init_schema(&writer)?;

        let reader = Connection::open(path)?;
        reader.busy_timeout(BUSY_TIMEOUT)?;

        tracing::info!(path = %path.display(), journal = %journal, "opened message database");

        Ok(Self { writer: Arc::new(Mutex::new(writer)), reader: Arc::new(Mutex::new(reader)) })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;

        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { writer: Arc::clone(&conn), reader: conn })
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Unavailable("writer connection poisoned".to_string()))
    }

    fn lock_reader(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Unavailable("reader connection poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            body TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn to_sql_id(id: MessageId) -> Result<i64, StorageError> {
    i64::try_from(id).map_err(|_| StorageError::Corrupt(format!("id {id} out of range")))
}

fn to_sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as "no limit".
    limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX))
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_id: i64 = row.get(0)?;
    let id = MessageId::try_from(raw_id)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, raw_id))?;

    Ok(Message { id, username: row.get(1)?, body: row.get(2)?, timestamp: row.get(3)? })
}

fn storage_error_from_row(err: rusqlite::Error) -> StorageError {
    match err {
        rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::FromSqlConversionFailure(..) => {
            StorageError::Corrupt(err.to_string())
        },
        other => StorageError::from(other),
    }
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Message>, StorageError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let messages = stmt
        .query_map(params, message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_error_from_row)?;
    Ok(messages)
}

impl Storage for SqliteStorage {
    fn store_message(&self, message: &Message) -> Result<(), StorageError> {
        let id = to_sql_id(message.id)?;

        let mut conn = self.lock_writer()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<i64> =
            tx.query_row("SELECT MAX(id) FROM messages", [], |row| row.get(0))?;
        let expected = latest.map_or(1, |latest| latest + 1);
        if id != expected {
            // Dropping `tx` rolls back.
            return Err(StorageError::Conflict {
                expected: MessageId::try_from(expected).unwrap_or_default(),
                got: message.id,
            });
        }

        tx.execute(
            "INSERT INTO messages (id, username, body, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![id, message.username, message.body, message.timestamp],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn latest_message(&self) -> Result<Option<Message>, StorageError> {
        let conn = self.lock_reader()?;
        conn.query_row(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"), [], message_from_row)
            .optional()
            .map_err(storage_error_from_row)
    }

    fn load_messages(
        &self,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError> {
        let after = i64::try_from(after).unwrap_or(i64::MAX);
        let conn = self.lock_reader()?;
        query_messages(
            &conn,
            &format!("{SELECT_COLUMNS} WHERE id > ?1 ORDER BY id ASC LIMIT ?2"),
            params![after, to_sql_limit(limit)],
        )
    }

    fn load_recent(&self, limit: usize) -> Result<Vec<Message>, StorageError> {
        let conn = self.lock_reader()?;
        query_messages(
            &conn,
            &format!(
                "SELECT * FROM ({SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1) ORDER BY id ASC"
            ),
            params![to_sql_limit(Some(limit))],
        )
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        let conn = self.lock_reader()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| StorageError::Corrupt(format!("negative count {count}")))
    }
}

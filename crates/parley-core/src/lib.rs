//! Parley core: the chat transcript as an append-only, totally ordered log.
//!
//! ## Architecture
//!
//! ```text
//! parley-core
//!   ├─ MessageStore   (validation + id/timestamp assignment, reads)
//!   ├─ Sequencer      (tail tracking; the single serialization point)
//!   ├─ Clock          (injected time source)
//!   └─ Storage        (MemoryStorage | SqliteStorage | ChaoticStorage)
//! ```
//!
//! ## Invariants
//!
//! - Ids start at 1 and increase by exactly 1 per committed message.
//! - Timestamps never decrease along the id order.
//! - Every read is a gap-free prefix (or window) of the log.
//! - A failed append consumes no id.
//!
//! There is no async runtime dependency here; callers on an executor are
//! expected to move store calls onto a blocking thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod message;
pub mod sequencer;
pub mod storage;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, ValidationError};
pub use message::{Message, MessageId};
pub use sequencer::{Sequencer, SequencerError, Slot};
pub use storage::{
    Backend, ChaoticStorage, FaultMode, MemoryStorage, SqliteStorage, Storage, StorageConfig,
    StorageError,
};
pub use store::MessageStore;

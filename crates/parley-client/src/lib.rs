//! Parley client.
//!
//! # Components
//!
//! - [`Transcript`]: local copy of the log; merges incremental batches and
//!   detects gaps (pure state, no I/O)
//! - [`Connection`]: one TCP connection, one server-side session
//! - [`ClientError`]: failures, classified as fatal or retryable

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod error;
mod transcript;

pub use connection::{Connection, Welcome};
pub use error::ClientError;
pub use parley_proto::{ErrorKind, WireMessage};
pub use transcript::Transcript;

//! Client error types.

use parley_proto::{ErrorKind, ProtocolError};
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket read or write failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Server answered with an error.
    #[error("server rejected request ({kind:?}): {message}")]
    Server {
        /// Error category.
        kind: ErrorKind,
        /// Server's description.
        message: String,
    },

    /// Server answered with a response of the wrong shape.
    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        /// Response variant the request calls for.
        expected: &'static str,
        /// What arrived instead.
        got: String,
    },

    /// An incremental batch does not continue the local transcript.
    #[error("transcript gap: expected id {expected}, got {got}")]
    Gap {
        /// Next id the transcript expects.
        expected: u64,
        /// First id of the offending batch.
        got: u64,
    },
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors end the connection. Everything else leaves the
    /// connection usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::Protocol(_)
            | Self::ConnectionClosed
            | Self::UnexpectedResponse { .. } => true,

            Self::Server { kind, .. } => *kind == ErrorKind::Protocol,

            // Recovered by a full resync
            Self::Gap { .. } => false,
        }
    }

    /// Returns true if sending the same request again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Server { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }
}

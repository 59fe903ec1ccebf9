//! Request/response connection to a Parley server.
//!
//! One TCP stream, one session on the server side. Requests are answered in
//! order, so a call writes one frame and reads exactly one back.

use std::time::Duration;

use bytes::BytesMut;
use parley_proto::{Request, Response, WireMessage};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, ToSocketAddrs},
};

use crate::{error::ClientError, transcript::Transcript};

/// Reply to a successful `SetUsername`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    /// Display name as the server stored it.
    pub username: String,
    /// Cadence the server asks clients to poll at.
    pub poll_interval: Duration,
}

/// An open connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl Connection {
    /// Connect to a server.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, read_buf: BytesMut::with_capacity(8 * 1024), write_buf: BytesMut::new() })
    }

    /// Send one request and wait for its response.
    ///
    /// A [`Response::Error`] is returned as [`ClientError::Server`].
    pub async fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        self.write_buf.clear();
        parley_proto::encode(request, &mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;

        match self.recv().await? {
            Response::Error { kind, message } => Err(ClientError::Server { kind, message }),
            response => Ok(response),
        }
    }

    async fn recv(&mut self) -> Result<Response, ClientError> {
        loop {
            if let Some(response) = parley_proto::decode(&mut self.read_buf)? {
                return Ok(response);
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Choose this session's display name.
    pub async fn set_username(&mut self, name: &str) -> Result<Welcome, ClientError> {
        match self.request(&Request::SetUsername { name: name.to_string() }).await? {
            Response::Active { username, poll_interval_ms } => {
                Ok(Welcome { username, poll_interval: Duration::from_millis(poll_interval_ms) })
            },
            other => Err(unexpected("Active", &other)),
        }
    }

    /// Post a message.
    pub async fn post(&mut self, body: &str) -> Result<WireMessage, ClientError> {
        match self.request(&Request::Post { body: body.to_string() }).await? {
            Response::Posted { message } => Ok(message),
            other => Err(unexpected("Posted", &other)),
        }
    }

    /// Fetch the full transcript.
    pub async fn poll(&mut self) -> Result<Vec<WireMessage>, ClientError> {
        self.transcript_request(Request::Poll).await
    }

    /// Fetch messages after `after_id`.
    pub async fn poll_since(&mut self, after_id: u64) -> Result<Vec<WireMessage>, ClientError> {
        self.transcript_request(Request::PollSince { after_id }).await
    }

    /// Fetch the last `limit` messages.
    pub async fn poll_recent(&mut self, limit: u32) -> Result<Vec<WireMessage>, ClientError> {
        self.transcript_request(Request::PollRecent { limit }).await
    }

    async fn transcript_request(
        &mut self,
        request: Request,
    ) -> Result<Vec<WireMessage>, ClientError> {
        match self.request(&request).await? {
            Response::Transcript { messages } => Ok(messages),
            other => Err(unexpected("Transcript", &other)),
        }
    }

    /// Bring `transcript` up to date; returns the messages that were new.
    ///
    /// Fetches incrementally and falls back to a full poll when the batch
    /// does not line up with what the transcript holds.
    pub async fn refresh(
        &mut self,
        transcript: &mut Transcript,
    ) -> Result<Vec<WireMessage>, ClientError> {
        let batch = self.poll_since(transcript.last_id()).await?;
        let (expected, got) = match transcript.merge(batch) {
            Ok(fresh) => return Ok(fresh.to_vec()),
            Err(ClientError::Gap { expected, got }) => (expected, got),
            Err(e) => return Err(e),
        };

        tracing::warn!("Transcript gap (expected {}, got {}); resyncing", expected, got);
        let snapshot = self.poll().await?;
        Ok(transcript.replace(snapshot).to_vec())
    }

    /// [`refresh`](Self::refresh) for interactive loops.
    ///
    /// A failure the session survives is logged and reported as nothing
    /// new; the next call picks up from the same position. Only fatal
    /// errors are returned.
    pub async fn catch_up(
        &mut self,
        transcript: &mut Transcript,
    ) -> Result<Vec<WireMessage>, ClientError> {
        match self.refresh(transcript).await {
            Err(e) if !e.is_fatal() => {
                tracing::warn!("Refresh failed: {}", e);
                Ok(Vec::new())
            },
            result => result,
        }
    }

    /// End the session and close the connection.
    pub async fn goodbye(mut self) -> Result<(), ClientError> {
        match self.request(&Request::Goodbye).await? {
            Response::Goodbye => {
                // The server closes its side right after replying.
                if let Err(e) = self.stream.shutdown().await {
                    tracing::debug!("Shutdown after goodbye failed: {}", e);
                }
                Ok(())
            },
            other => Err(unexpected("Goodbye", &other)),
        }
    }
}

fn unexpected(expected: &'static str, got: &Response) -> ClientError {
    ClientError::UnexpectedResponse { expected, got: format!("{got:?}") }
}

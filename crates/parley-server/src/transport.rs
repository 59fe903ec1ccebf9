//! TCP transport.
//!
//! One tokio task per connection. Each connection owns exactly one session:
//! opened on accept, closed when the peer says goodbye or goes away. Frames
//! are decoded with the Sans-IO codec from `parley-proto`; requests run on
//! the blocking pool since storage may hit disk.

use std::sync::Arc;

use bytes::BytesMut;
use parley_core::{Clock, Storage};
use parley_proto::{ErrorKind, Request, Response};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    error::ServerError,
    gateway::Gateway,
    handler::{Flow, error_response, handle_request},
    session::SessionId,
};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Serve one accepted connection until it closes.
pub(crate) async fn serve_connection<S, C>(
    mut stream: TcpStream,
    gateway: Arc<Gateway<S, C>>,
) -> Result<(), ServerError>
where
    S: Storage + 'static,
    C: Clock,
{
    let mut out = BytesMut::new();

    let session = match gateway.open_session() {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            write_response(&mut stream, &mut out, &error_response(&e)).await?;
            return Ok(());
        },
    };

    let result = drive(&mut stream, &mut out, &gateway, session).await;
    gateway.close_session(session);
    result
}

async fn drive<S, C>(
    stream: &mut TcpStream,
    out: &mut BytesMut,
    gateway: &Arc<Gateway<S, C>>,
    session: SessionId,
) -> Result<(), ServerError>
where
    S: Storage + 'static,
    C: Clock,
{
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        loop {
            let request = match parley_proto::decode::<Request>(&mut buf) {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(session = %session, "Frame decode error: {}", e);
                    let response =
                        Response::Error { kind: ErrorKind::Protocol, message: e.to_string() };
                    write_response(stream, out, &response).await?;
                    return Ok(());
                },
            };

            let gateway = Arc::clone(gateway);
            let (response, flow) =
                tokio::task::spawn_blocking(move || handle_request(&*gateway, session, request))
                    .await
                    .map_err(|e| ServerError::Internal(e.to_string()))?;

            write_response(stream, out, &response).await?;
            if flow == Flow::Close {
                tracing::debug!(session = %session, "Client said goodbye");
                return Ok(());
            }
        }

        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            tracing::debug!(session = %session, "Connection closed by peer");
            return Ok(());
        }
    }
}

async fn write_response(
    stream: &mut TcpStream,
    out: &mut BytesMut,
    response: &Response,
) -> Result<(), ServerError> {
    out.clear();
    parley_proto::encode(response, out)?;
    stream.write_all(out).await?;
    Ok(())
}

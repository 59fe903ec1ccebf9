//! Request dispatch.
//!
//! Maps one decoded [`Request`] onto the gateway and shapes the reply.
//! Synchronous: the transport runs it on the blocking pool because storage
//! calls may touch disk.

use parley_core::{Clock, Message, Storage};
use parley_proto::{Request, Response, WireMessage};

use crate::{
    gateway::{Gateway, GatewayError},
    session::SessionId,
};

/// What the connection should do after sending the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading requests.
    Continue,
    /// Close the connection.
    Close,
}

/// Handle one request for `session`.
pub fn handle_request<S: Storage, C: Clock>(
    gateway: &Gateway<S, C>,
    session: SessionId,
    request: Request,
) -> (Response, Flow) {
    let result = match request {
        Request::SetUsername { name } => gateway.set_username(session, &name).map(|username| {
            let poll_interval_ms =
                u64::try_from(gateway.config().poll_interval.as_millis()).unwrap_or(u64::MAX);
            Response::Active { username, poll_interval_ms }
        }),
        Request::Post { body } => gateway
            .post(session, &body)
            .map(|message| Response::Posted { message: message.into() }),
        Request::Poll => gateway.poll(session).map(transcript),
        Request::PollSince { after_id } => gateway.poll_since(session, after_id).map(transcript),
        Request::PollRecent { limit } => {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            gateway.poll_recent(session, limit).map(transcript)
        },
        Request::Goodbye => return (Response::Goodbye, Flow::Close),
    };

    match result {
        Ok(response) => (response, Flow::Continue),
        Err(e) => {
            tracing::warn!(session = %session, kind = ?e.kind(), "request rejected: {}", e);
            (error_response(&e), Flow::Continue)
        },
    }
}

/// Wire form of a gateway error.
pub fn error_response(err: &GatewayError) -> Response {
    Response::Error { kind: err.kind(), message: err.to_string() }
}

fn transcript(messages: Vec<Message>) -> Response {
    Response::Transcript { messages: messages.into_iter().map(WireMessage::from).collect() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_core::{ManualClock, MemoryStorage, MessageStore};
    use parley_proto::ErrorKind;

    use super::*;
    use crate::gateway::GatewayConfig;

    fn setup() -> (Gateway<MemoryStorage, ManualClock>, SessionId) {
        let store = Arc::new(MessageStore::new(MemoryStorage::new()));
        let gateway = Gateway::new(store, ManualClock::at_epoch(), GatewayConfig::default());
        let session = gateway.open_session().unwrap();
        (gateway, session)
    }

    #[test]
    fn set_username_advertises_poll_interval() {
        let (gateway, session) = setup();

        let (response, flow) =
            handle_request(&gateway, session, Request::SetUsername { name: " bob ".to_string() });

        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            response,
            Response::Active { username: " bob ".to_string(), poll_interval_ms: 2000 }
        );
    }

    #[test]
    fn post_before_username_is_not_authenticated() {
        let (gateway, session) = setup();

        let (response, _) =
            handle_request(&gateway, session, Request::Post { body: "hi".to_string() });

        match response {
            Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotAuthenticated),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn post_then_poll_since() {
        let (gateway, session) = setup();
        handle_request(&gateway, session, Request::SetUsername { name: "a".to_string() });
        handle_request(&gateway, session, Request::Post { body: "one".to_string() });
        handle_request(&gateway, session, Request::Post { body: "two".to_string() });

        let (response, _) = handle_request(&gateway, session, Request::PollSince { after_id: 1 });
        match response {
            Response::Transcript { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].id, 2);
                assert_eq!(messages[0].body, "two");
            },
            other => panic!("expected transcript, got {other:?}"),
        }
    }

    #[test]
    fn goodbye_closes() {
        let (gateway, session) = setup();
        let (response, flow) = handle_request(&gateway, session, Request::Goodbye);
        assert_eq!(response, Response::Goodbye);
        assert_eq!(flow, Flow::Close);
    }
}

//! Fuzz target for the [`Session`] state machine
//!
//! # Invariants
//!
//! - `Active` ONLY reachable via an accepted `set_username`
//! - No transition out of `Active`; the name never changes once chosen
//! - A chosen name is stored as given, non-empty and within the limit
//! - `author()` fails exactly while `Unauthenticated`
//! - Cooldown rejects only posts inside the window and reports a
//!   `retry_after` no longer than the window

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use chrono::{DateTime, TimeDelta, Utc};
use libfuzzer_sys::fuzz_target;
use parley_server::{GatewayError, Session, SessionId, SessionState};

#[derive(Debug, Arbitrary)]
enum Event {
    SetUsername(String),
    Post,
    Advance { millis: u16 },
    StepBack { millis: u16 },
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    max_chars: u8,
    cooldown_millis: u16,
    events: Vec<Event>,
}

fuzz_target!(|input: FuzzInput| {
    let max_chars = usize::from(input.max_chars);
    let cooldown = Duration::from_millis(u64::from(input.cooldown_millis));
    let mut now = DateTime::<Utc>::UNIX_EPOCH;
    let mut session = Session::new(SessionId::from_raw(1));
    let mut chosen: Option<String> = None;

    for event in input.events {
        match event {
            Event::SetUsername(name) => {
                let result = session.set_username(&name, max_chars);
                match (&chosen, result) {
                    (Some(_), Ok(_)) => panic!("renamed an active session"),
                    (Some(_), Err(e)) => assert!(matches!(e, GatewayError::AlreadyActive { .. })),
                    (None, Ok(stored)) => {
                        assert_eq!(stored, name);
                        assert!(!stored.is_empty());
                        assert!(stored.chars().count() <= max_chars);
                        chosen = Some(stored);
                    },
                    (None, Err(_)) => assert_eq!(session.state(), &SessionState::Unauthenticated),
                }
            },
            Event::Post => match session.author().map(str::to_string) {
                Err(e) => {
                    assert!(chosen.is_none());
                    assert_eq!(e, GatewayError::NotAuthenticated);
                },
                Ok(author) => {
                    assert_eq!(Some(author), chosen);
                    match session.check_cooldown(now, cooldown) {
                        Ok(()) => session.record_post(now),
                        Err(GatewayError::RateLimited { retry_after }) => {
                            assert!(!retry_after.is_zero());
                            assert!(retry_after <= cooldown);
                        },
                        Err(other) => panic!("unexpected cooldown error: {other}"),
                    }
                },
            },
            Event::Advance { millis } => {
                now += TimeDelta::milliseconds(i64::from(millis));
            },
            Event::StepBack { millis } => {
                now -= TimeDelta::milliseconds(i64::from(millis));
            },
        }

        assert_eq!(session.username(), chosen.as_deref());
    }
});

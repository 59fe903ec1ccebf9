//! Fuzz target for [`MessageStore`] id assignment under storage faults
//!
//! # Strategy
//!
//! - Interleave appends, reads, clock jumps and outages
//! - Both fault modes: failure before the write and lost acknowledgement
//!
//! # Invariants
//!
//! - The log is always exactly 1..=n
//! - A successful append returns the id it was stored under
//! - Timestamps never decrease along the log
//! - Rejected input never reaches storage

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use chrono::TimeDelta;
use libfuzzer_sys::fuzz_target;
use parley_core::{
    ChaoticStorage, Clock, FaultMode, ManualClock, MemoryStorage, MessageStore, Storage, StoreError,
};

#[derive(Debug, Arbitrary)]
enum Event {
    Append { username: String, body: String },
    ReadSince { after: u8 },
    ReadRecent { limit: u8 },
    Advance { millis: u16 },
    JumpBack { secs: u16 },
    Outage { down: bool },
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    lost_acks: bool,
    failure_percent: u8,
    seed: u64,
    events: Vec<Event>,
}

fuzz_target!(|input: FuzzInput| {
    let mode = if input.lost_acks { FaultMode::AfterWrite } else { FaultMode::BeforeWrite };
    let rate = f64::from(input.failure_percent % 50) / 100.0;
    let storage = ChaoticStorage::new(MemoryStorage::new(), rate, input.seed).with_mode(mode);
    let store = MessageStore::new(storage);
    let clock = ManualClock::at_epoch();

    for event in input.events {
        match event {
            Event::Append { username, body } => {
                let before = store.storage().inner().message_count().expect("memory read");
                match store.append(&username, &body, &clock) {
                    Ok(message) => {
                        let stored = store
                            .storage()
                            .inner()
                            .load_messages(message.id - 1, Some(1))
                            .expect("memory read");
                        assert_eq!(stored, vec![message]);
                    },
                    Err(StoreError::Validation(_)) => {
                        assert!(username.is_empty() || body.is_empty());
                        let after = store.storage().inner().message_count().expect("memory read");
                        assert_eq!(before, after);
                    },
                    Err(StoreError::StorageUnavailable { .. }) => {},
                }
            },
            Event::ReadSince { after } => {
                if let Ok(messages) = store.read_since(u64::from(after)) {
                    assert!(messages.iter().all(|m| m.id > u64::from(after)));
                }
            },
            Event::ReadRecent { limit } => {
                if let Ok(messages) = store.read_recent(usize::from(limit)) {
                    assert!(messages.len() <= usize::from(limit));
                }
            },
            Event::Advance { millis } => clock.advance(Duration::from_millis(u64::from(millis))),
            Event::JumpBack { secs } => {
                clock.set(clock.now() - TimeDelta::seconds(i64::from(secs)));
            },
            Event::Outage { down } => store.storage().set_outage(down),
        }

        let log = store.storage().inner().load_messages(0, None).expect("memory read");
        for (i, message) in log.iter().enumerate() {
            assert_eq!(message.id, i as u64 + 1, "gap or repeat in log");
        }
        for pair in log.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp, "timestamp went backwards");
        }
    }
});

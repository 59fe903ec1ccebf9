//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! gateway behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld      Compare
//!      (reference)   (Gateway)      Results + State
//! ```

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parley_core::{ChaoticStorage, ManualClock, MemoryStorage, Message, MessageStore, Storage};
use parley_harness::{
    ClientId, ModelConfig, ModelMessage, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, SmallText, Workload,
};
use parley_server::{Gateway, GatewayConfig, GatewayError, SessionId};
use proptest::prelude::*;

type RealStorage = ChaoticStorage<MemoryStorage>;

/// Real system wrapper that mirrors `ModelWorld`'s interface.
struct RealWorld {
    gateway: Gateway<RealStorage, ManualClock>,
    store: Arc<MessageStore<RealStorage>>,
    clock: ManualClock,
    sessions: Vec<Option<SessionId>>,
}

impl RealWorld {
    fn new(num_clients: usize, config: ModelConfig) -> Self {
        let clock = ManualClock::at_epoch();
        let store =
            Arc::new(MessageStore::new(ChaoticStorage::new(MemoryStorage::new(), 0.0, 0)));
        let gateway = Gateway::new(
            Arc::clone(&store),
            clock.clone(),
            GatewayConfig {
                max_username_chars: config.max_username_chars,
                max_body_chars: config.max_body_chars,
                post_cooldown: Duration::from_millis(config.post_cooldown_ms),
                ..Default::default()
            },
        );
        Self { gateway, store, clock, sessions: vec![None; num_clients] }
    }

    fn session(&self, client_id: ClientId) -> Result<SessionId, OperationError> {
        self.sessions
            .get(usize::from(client_id))
            .copied()
            .flatten()
            .ok_or(OperationError::NotConnected)
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Connect { client_id } => self.apply_connect(*client_id),
            Operation::Disconnect { client_id } => self.apply_disconnect(*client_id),
            Operation::SetUsername { client_id, name } => self.with_session(*client_id, |g, s| {
                g.set_username(s, &name.to_text()).map(OperationResult::Active)
            }),
            Operation::Post { client_id, body } => self.with_session(*client_id, |g, s| {
                g.post(s, &body.to_text()).map(|m| OperationResult::Posted(m.id))
            }),
            Operation::Poll { client_id } => {
                self.with_session(*client_id, |g, s| g.poll(s).map(transcript))
            },
            Operation::PollSince { client_id, after } => self.with_session(*client_id, |g, s| {
                g.poll_since(s, u64::from(*after)).map(transcript)
            }),
            Operation::PollRecent { client_id, limit } => self.with_session(*client_id, |g, s| {
                g.poll_recent(s, usize::from(*limit)).map(transcript)
            }),
            Operation::AdvanceTime { millis } => {
                self.clock.advance(Duration::from_millis(u64::from(*millis)));
                OperationResult::Ok
            },
            Operation::SetOutage { down } => {
                self.store.storage().set_outage(*down);
                OperationResult::Ok
            },
        }
    }

    fn with_session<F>(&self, client_id: ClientId, f: F) -> OperationResult
    where
        F: FnOnce(
            &Gateway<RealStorage, ManualClock>,
            SessionId,
        ) -> Result<OperationResult, GatewayError>,
    {
        let session = match self.session(client_id) {
            Ok(s) => s,
            Err(e) => return OperationResult::Error(e),
        };
        f(&self.gateway, session).unwrap_or_else(|e| OperationResult::Error(classify(&e)))
    }

    fn apply_connect(&mut self, client_id: ClientId) -> OperationResult {
        let Some(slot) = self.sessions.get_mut(usize::from(client_id)) else {
            return OperationResult::Error(OperationError::NotConnected);
        };
        if slot.is_some() {
            return OperationResult::Error(OperationError::AlreadyConnected);
        }
        match self.gateway.open_session() {
            Ok(id) => {
                *slot = Some(id);
                OperationResult::Ok
            },
            Err(e) => OperationResult::Error(classify(&e)),
        }
    }

    fn apply_disconnect(&mut self, client_id: ClientId) -> OperationResult {
        match self.sessions.get_mut(usize::from(client_id)).and_then(Option::take) {
            Some(id) => {
                assert!(self.gateway.close_session(id), "gateway lost session {id}");
                OperationResult::Ok
            },
            None => OperationResult::Error(OperationError::NotConnected),
        }
    }

    fn observable_state(&self) -> ObservableState {
        let sessions = self
            .sessions
            .iter()
            .map(|s| s.map(|id| self.gateway.username(id).expect("session vanished")))
            .collect();

        let log = self
            .store
            .storage()
            .inner()
            .load_messages(0, None)
            .expect("memory storage read failed")
            .into_iter()
            .map(|m| ModelMessage {
                id: m.id,
                username: m.username,
                body: m.body,
                at_ms: u64::try_from((m.timestamp - DateTime::<Utc>::UNIX_EPOCH).num_milliseconds())
                    .expect("timestamp before epoch"),
            })
            .collect();

        ObservableState { sessions, log }
    }
}

fn transcript(messages: Vec<Message>) -> OperationResult {
    OperationResult::Transcript(messages.into_iter().map(|m| m.id).collect())
}

fn classify(err: &GatewayError) -> OperationError {
    match err {
        GatewayError::NotAuthenticated => OperationError::NotAuthenticated,
        GatewayError::Validation(_) => OperationError::Validation,
        GatewayError::AlreadyActive { .. } => OperationError::AlreadyActive,
        GatewayError::RateLimited { .. } => OperationError::RateLimited,
        GatewayError::StorageUnavailable { .. } => OperationError::StorageUnavailable,
        GatewayError::SessionNotFound(_) => OperationError::NotConnected,
        other => panic!("unexpected gateway error: {other}"),
    }
}

fn run(ops: &[Operation], num_clients: usize, config: ModelConfig) -> Result<(), TestCaseError> {
    let mut model = ModelWorld::new(num_clients, config);
    let mut real = RealWorld::new(num_clients, config);

    for (i, op) in ops.iter().enumerate() {
        let op = op.clone().clamp_client(num_clients);
        let model_result = model.apply(&op);
        let real_result = real.apply(&op);

        prop_assert_eq!(
            &model_result,
            &real_result,
            "Divergence at operation {}: {:?}",
            i,
            op
        );
    }

    prop_assert_eq!(model.observable_state(), real.observable_state());
    Ok(())
}

fn small_text_strategy() -> impl Strategy<Value = SmallText> {
    (any::<u8>(), any::<u8>()).prop_map(|(seed, size_class)| SmallText { seed, size_class })
}

/// Strategy for generating operations with valid client IDs.
fn operation_strategy(num_clients: u8) -> impl Strategy<Value = Operation> {
    let client_id = 0..num_clients;

    prop_oneof![
        2 => client_id.clone().prop_map(|c| Operation::Connect { client_id: c }),
        1 => client_id.clone().prop_map(|c| Operation::Disconnect { client_id: c }),
        3 => (client_id.clone(), small_text_strategy())
            .prop_map(|(c, name)| Operation::SetUsername { client_id: c, name }),
        6 => (client_id.clone(), small_text_strategy())
            .prop_map(|(c, body)| Operation::Post { client_id: c, body }),
        2 => client_id.clone().prop_map(|c| Operation::Poll { client_id: c }),
        2 => (client_id.clone(), any::<u8>())
            .prop_map(|(c, after)| Operation::PollSince { client_id: c, after }),
        2 => (client_id, any::<u8>())
            .prop_map(|(c, limit)| Operation::PollRecent { client_id: c, limit }),
        2 => any::<u16>().prop_map(|millis| Operation::AdvanceTime { millis }),
        1 => any::<bool>().prop_map(|down| Operation::SetOutage { down }),
    ]
}

fn config_strategy() -> impl Strategy<Value = ModelConfig> {
    (
        prop_oneof![Just(64usize), Just(8usize)],
        prop_oneof![Just(None), Just(Some(72usize))],
        prop_oneof![Just(0u64), Just(3_000u64)],
    )
        .prop_map(|(max_username_chars, max_body_chars, post_cooldown_ms)| ModelConfig {
            max_username_chars,
            max_body_chars,
            post_cooldown_ms,
        })
}

proptest! {
    /// Operation results and final state match between model and gateway.
    #[test]
    fn prop_model_matches_real(
        num_clients in 1..5usize,
        config in config_strategy(),
        ops in prop::collection::vec(operation_strategy(4), 0..80)
    ) {
        run(&ops, num_clients, config)?;
    }
}

#[test]
fn test_seeded_workloads_match_model() {
    for seed in 0..16 {
        let ops = Workload::new(seed, 3).operations(300);
        let config = ModelConfig { post_cooldown_ms: 500, ..Default::default() };
        if let Err(e) = run(&ops, 3, config) {
            panic!("seed {seed} diverged: {e}");
        }
    }
}

#[test]
fn test_documented_scenario() {
    let word = |seed| SmallText { seed, size_class: 2 };
    let ops = vec![
        Operation::Connect { client_id: 0 },
        Operation::SetUsername { client_id: 0, name: word(1) },
        Operation::Post { client_id: 0, body: word(2) },
        Operation::Post { client_id: 0, body: word(3) },
        Operation::Poll { client_id: 0 },
    ];

    let mut real = RealWorld::new(1, ModelConfig::default());
    let results: Vec<_> = ops.iter().map(|op| real.apply(op)).collect();
    assert_eq!(
        results,
        vec![
            OperationResult::Ok,
            OperationResult::Active("  w1  ".to_string()),
            OperationResult::Posted(1),
            OperationResult::Posted(2),
            OperationResult::Transcript(vec![1, 2]),
        ]
    );
}

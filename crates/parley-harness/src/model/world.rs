//! Model world: sessions plus one ordered log.
//!
//! The oracle against which the real gateway is verified.

use super::{
    operation::{ClientId, Operation, OperationError, OperationResult},
    session::ModelSession,
};

/// Policy knobs mirrored from the gateway configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Longest accepted name, in characters.
    pub max_username_chars: usize,
    /// Longest accepted body, in characters.
    pub max_body_chars: Option<usize>,
    /// Minimum spacing between posts from one session.
    pub post_cooldown_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { max_username_chars: 64, max_body_chars: None, post_cooldown_ms: 0 }
    }
}

/// Message in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Position in the log, from 1.
    pub id: u64,
    /// Author's display name.
    pub username: String,
    /// Body as posted.
    pub body: String,
    /// Model time of the commit.
    pub at_ms: u64,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-client session: `None` when disconnected, otherwise the chosen
    /// name (if any).
    pub sessions: Vec<Option<Option<String>>>,
    /// The whole log.
    pub log: Vec<ModelMessage>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    config: ModelConfig,
    sessions: Vec<Option<ModelSession>>,
    log: Vec<ModelMessage>,
    now_ms: u64,
    outage: bool,
}

impl ModelWorld {
    /// Create a model world with `num_clients` disconnected clients.
    pub fn new(num_clients: usize, config: ModelConfig) -> Self {
        Self {
            config,
            sessions: vec![None; num_clients],
            log: Vec::new(),
            now_ms: 0,
            outage: false,
        }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.sessions.len()
    }

    /// Current model time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// The log so far.
    pub fn log(&self) -> &[ModelMessage] {
        &self.log
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Connect { client_id } => self.apply_connect(*client_id),
            Operation::Disconnect { client_id } => self.apply_disconnect(*client_id),
            Operation::SetUsername { client_id, name } => {
                self.apply_set_username(*client_id, &name.to_text())
            },
            Operation::Post { client_id, body } => self.apply_post(*client_id, &body.to_text()),
            Operation::Poll { client_id } => {
                self.apply_read(*client_id, |log| log.iter().collect())
            },
            Operation::PollSince { client_id, after } => self.apply_read(*client_id, |log| {
                log.iter().filter(|m| m.id > u64::from(*after)).collect()
            }),
            Operation::PollRecent { client_id, limit } => {
                if *limit == 0 {
                    // Nothing to read; storage is not consulted.
                    return match self.session(*client_id) {
                        Ok(_) => OperationResult::Transcript(Vec::new()),
                        Err(e) => OperationResult::Error(e),
                    };
                }
                let limit = usize::from(*limit);
                self.apply_read(*client_id, |log| {
                    log.iter().skip(log.len().saturating_sub(limit)).collect()
                })
            },
            Operation::AdvanceTime { millis } => {
                self.now_ms += u64::from(*millis);
                OperationResult::Ok
            },
            Operation::SetOutage { down } => {
                self.outage = *down;
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let sessions =
            self.sessions.iter().map(|s| s.as_ref().map(|s| s.username.clone())).collect();
        ObservableState { sessions, log: self.log.clone() }
    }

    fn session(&self, client_id: ClientId) -> Result<&ModelSession, OperationError> {
        self.sessions
            .get(usize::from(client_id))
            .and_then(Option::as_ref)
            .ok_or(OperationError::NotConnected)
    }

    fn session_mut(&mut self, client_id: ClientId) -> Result<&mut ModelSession, OperationError> {
        self.sessions
            .get_mut(usize::from(client_id))
            .and_then(Option::as_mut)
            .ok_or(OperationError::NotConnected)
    }

    fn apply_connect(&mut self, client_id: ClientId) -> OperationResult {
        match self.sessions.get_mut(usize::from(client_id)) {
            None => OperationResult::Error(OperationError::NotConnected),
            Some(Some(_)) => OperationResult::Error(OperationError::AlreadyConnected),
            Some(slot) => {
                *slot = Some(ModelSession::default());
                OperationResult::Ok
            },
        }
    }

    fn apply_disconnect(&mut self, client_id: ClientId) -> OperationResult {
        match self.sessions.get_mut(usize::from(client_id)) {
            Some(slot @ Some(_)) => {
                *slot = None;
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::NotConnected),
        }
    }

    fn apply_set_username(&mut self, client_id: ClientId, name: &str) -> OperationResult {
        let max = self.config.max_username_chars;
        let session = match self.session_mut(client_id) {
            Ok(s) => s,
            Err(e) => return OperationResult::Error(e),
        };

        if session.username.is_some() {
            return OperationResult::Error(OperationError::AlreadyActive);
        }
        if name.is_empty() || name.chars().count() > max {
            return OperationResult::Error(OperationError::Validation);
        }

        session.username = Some(name.to_string());
        OperationResult::Active(name.to_string())
    }

    fn apply_post(&mut self, client_id: ClientId, body: &str) -> OperationResult {
        let config = self.config;
        let now = self.now_ms;
        let outage = self.outage;
        let next_id = self.log.len() as u64 + 1;

        let session = match self.session_mut(client_id) {
            Ok(s) => s,
            Err(e) => return OperationResult::Error(e),
        };
        let Some(username) = session.username.clone() else {
            return OperationResult::Error(OperationError::NotAuthenticated);
        };
        if body.is_empty() {
            return OperationResult::Error(OperationError::Validation);
        }
        if config.max_body_chars.is_some_and(|max| body.chars().count() > max) {
            return OperationResult::Error(OperationError::Validation);
        }
        if session.last_post_ms.is_some_and(|last| now - last < config.post_cooldown_ms) {
            return OperationResult::Error(OperationError::RateLimited);
        }
        if outage {
            return OperationResult::Error(OperationError::StorageUnavailable);
        }

        session.last_post_ms = Some(now);
        self.log.push(ModelMessage { id: next_id, username, body: body.to_string(), at_ms: now });
        OperationResult::Posted(next_id)
    }

    fn apply_read<F>(&self, client_id: ClientId, select: F) -> OperationResult
    where
        F: FnOnce(&[ModelMessage]) -> Vec<&ModelMessage>,
    {
        if let Err(e) = self.session(client_id) {
            return OperationResult::Error(e);
        }
        if self.outage {
            return OperationResult::Error(OperationError::StorageUnavailable);
        }
        OperationResult::Transcript(select(&self.log).into_iter().map(|m| m.id).collect())
    }
}

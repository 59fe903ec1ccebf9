//! Fault-injecting storage wrapper.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Storage, StorageError};
use crate::message::{Message, MessageId};

/// When an injected write fault fires relative to the real write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Fail without touching the inner backend.
    #[default]
    BeforeWrite,
    /// Perform the write, then report failure (a commit whose
    /// acknowledgement was lost).
    AfterWrite,
}

/// Wraps a backend and makes a seeded fraction of calls fail with
/// [`StorageError::Unavailable`].
///
/// An explicit outage switch fails every call until cleared. Same seed, same
/// call sequence, same faults.
#[derive(Debug)]
pub struct ChaoticStorage<S> {
    inner: S,
    failure_rate: f64,
    mode: FaultMode,
    rng: Mutex<ChaCha8Rng>,
    outage: AtomicBool,
    injected: AtomicU64,
}

impl<S: Storage> ChaoticStorage<S> {
    /// Wrap `inner`; `failure_rate` is clamped to `0.0..=1.0`.
    pub fn new(inner: S, failure_rate: f64, seed: u64) -> Self {
        let failure_rate = if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) };
        Self {
            inner,
            failure_rate,
            mode: FaultMode::default(),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            outage: AtomicBool::new(false),
            injected: AtomicU64::new(0),
        }
    }

    /// Set when write faults fire.
    #[must_use]
    pub fn with_mode(mut self, mode: FaultMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fail every call while `down` is true.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Number of faults injected so far.
    pub fn injected_faults(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// The wrapped backend, bypassing fault injection.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn roll(&self) -> bool {
        if self.outage.load(Ordering::SeqCst) {
            return true;
        }
        if self.failure_rate <= 0.0 {
            return false;
        }
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(self.failure_rate)
    }

    fn fault(&self, op: &str) -> StorageError {
        self.injected.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(op, "injected storage fault");
        StorageError::Unavailable(format!("injected fault during {op}"))
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn store_message(&self, message: &Message) -> Result<(), StorageError> {
        if !self.roll() {
            return self.inner.store_message(message);
        }

        match self.mode {
            FaultMode::BeforeWrite => Err(self.fault("store_message")),
            FaultMode::AfterWrite => {
                self.inner.store_message(message)?;
                Err(self.fault("store_message"))
            },
        }
    }

    fn latest_message(&self) -> Result<Option<Message>, StorageError> {
        if self.roll() {
            return Err(self.fault("latest_message"));
        }
        self.inner.latest_message()
    }

    fn load_messages(
        &self,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError> {
        if self.roll() {
            return Err(self.fault("load_messages"));
        }
        self.inner.load_messages(after, limit)
    }

    fn load_recent(&self, limit: usize) -> Result<Vec<Message>, StorageError> {
        if self.roll() {
            return Err(self.fault("load_recent"));
        }
        self.inner.load_recent(limit)
    }

    fn message_count(&self) -> Result<usize, StorageError> {
        if self.roll() {
            return Err(self.fault("message_count"));
        }
        self.inner.message_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn zero_rate_never_fails() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 0.0, 7);
        for _ in 0..100 {
            storage.message_count().unwrap();
        }
        assert_eq!(storage.injected_faults(), 0);
    }

    #[test]
    fn outage_fails_everything_until_cleared() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 0.0, 7);

        storage.set_outage(true);
        assert!(storage.message_count().is_err());
        assert!(storage.load_messages(0, None).is_err());

        storage.set_outage(false);
        assert!(storage.message_count().is_ok());
        assert_eq!(storage.injected_faults(), 2);
    }

    #[test]
    fn same_seed_same_faults() {
        let pattern = |seed| {
            let storage = ChaoticStorage::new(MemoryStorage::new(), 0.5, seed);
            (0..64).map(|_| storage.message_count().is_err()).collect::<Vec<_>>()
        };
        assert_eq!(pattern(42), pattern(42));
    }

    #[test]
    fn rate_is_clamped() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 7.5, 1);
        assert!(storage.message_count().is_err());
    }
}

//! Local copy of the chat log.
//!
//! Pure state: the caller fetches batches and feeds them in. Each
//! incremental batch must continue exactly after the last id already held;
//! anything else is a [`ClientError::Gap`] and the caller resyncs with a
//! full snapshot through [`Transcript::replace`].

use parley_proto::WireMessage;

use crate::error::ClientError;

/// Messages seen so far, ascending by id.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<WireMessage>,
    last_id: u64,
    retain: Option<usize>,
}

impl Transcript {
    /// An empty transcript that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty transcript that keeps only the newest `retain` messages.
    ///
    /// Dropped messages still count towards [`Transcript::last_id`].
    pub fn with_retention(retain: usize) -> Self {
        Self { retain: Some(retain), ..Self::default() }
    }

    /// Highest id merged so far, 0 before any message.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Retained messages, ascending.
    pub fn messages(&self) -> &[WireMessage] {
        &self.messages
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages are retained.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append an incremental batch; returns the messages that were new.
    ///
    /// Messages already held are skipped. The remainder must be contiguous
    /// and start at `last_id + 1`, otherwise nothing changes and
    /// [`ClientError::Gap`] is returned.
    pub fn merge(&mut self, batch: Vec<WireMessage>) -> Result<&[WireMessage], ClientError> {
        let fresh: Vec<_> = batch.into_iter().filter(|m| m.id > self.last_id).collect();

        let mut expected = self.last_id + 1;
        for message in &fresh {
            if message.id != expected {
                return Err(ClientError::Gap { expected, got: message.id });
            }
            expected += 1;
        }

        Ok(self.extend(fresh))
    }

    /// Replace everything with an authoritative snapshot; returns the
    /// messages newer than what was held before.
    pub fn replace(&mut self, snapshot: Vec<WireMessage>) -> &[WireMessage] {
        let previous = self.last_id;
        let fresh = snapshot.iter().filter(|m| m.id > previous).count();

        self.last_id = snapshot.last().map_or(previous, |m| m.id.max(previous));
        self.messages = snapshot;
        self.trim();

        let start = self.messages.len().saturating_sub(fresh);
        &self.messages[start..]
    }

    fn extend(&mut self, fresh: Vec<WireMessage>) -> &[WireMessage] {
        let added = fresh.len();
        if let Some(last) = fresh.last() {
            self.last_id = last.id;
        }
        self.messages.extend(fresh);
        self.trim();

        let start = self.messages.len().saturating_sub(added);
        &self.messages[start..]
    }

    fn trim(&mut self) {
        let Some(retain) = self.retain else {
            return;
        };
        let excess = self.messages.len().saturating_sub(retain);
        self.messages.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    use super::*;

    fn msg(id: u64) -> WireMessage {
        WireMessage {
            id,
            username: "alice".to_string(),
            body: format!("m{id}"),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn batch(ids: impl IntoIterator<Item = u64>) -> Vec<WireMessage> {
        ids.into_iter().map(msg).collect()
    }

    fn ids(messages: &[WireMessage]) -> Vec<u64> {
        messages.iter().map(|m| m.id).collect()
    }

    #[test]
    fn merges_contiguous_batches() {
        let mut transcript = Transcript::new();

        assert_eq!(ids(transcript.merge(batch(1..=2)).unwrap()), vec![1, 2]);
        assert_eq!(ids(transcript.merge(batch(3..=5)).unwrap()), vec![3, 4, 5]);
        assert_eq!(ids(transcript.messages()), vec![1, 2, 3, 4, 5]);
        assert_eq!(transcript.last_id(), 5);
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut transcript = Transcript::new();
        transcript.merge(batch(1..=3)).unwrap();
        assert!(transcript.merge(Vec::new()).unwrap().is_empty());
        assert_eq!(transcript.last_id(), 3);
    }

    #[test]
    fn known_messages_are_skipped() {
        let mut transcript = Transcript::new();
        transcript.merge(batch(1..=3)).unwrap();

        assert_eq!(ids(transcript.merge(batch(2..=4)).unwrap()), vec![4]);
        assert_eq!(ids(transcript.messages()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn gap_is_rejected_without_change() {
        let mut transcript = Transcript::new();
        transcript.merge(batch(1..=2)).unwrap();

        let err = transcript.merge(batch(4..=5)).unwrap_err();
        assert!(matches!(err, ClientError::Gap { expected: 3, got: 4 }));
        assert_eq!(transcript.last_id(), 2);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn hole_inside_batch_is_rejected() {
        let mut transcript = Transcript::new();
        let err = transcript.merge(batch([1, 2, 4])).unwrap_err();
        assert!(matches!(err, ClientError::Gap { expected: 3, got: 4 }));
        assert!(transcript.is_empty());
    }

    #[test]
    fn replace_reports_only_newer_messages() {
        let mut transcript = Transcript::new();
        transcript.merge(batch(1..=2)).unwrap();

        let fresh = ids(transcript.replace(batch(1..=5)));
        assert_eq!(fresh, vec![3, 4, 5]);
        assert_eq!(transcript.last_id(), 5);
    }

    #[test]
    fn window_seeds_an_empty_transcript() {
        let mut transcript = Transcript::new();
        transcript.replace(batch(8..=10));

        assert_eq!(transcript.last_id(), 10);
        assert_eq!(ids(transcript.merge(batch([11])).unwrap()), vec![11]);
    }

    #[test]
    fn retention_keeps_newest() {
        let mut transcript = Transcript::with_retention(3);
        transcript.merge(batch(1..=2)).unwrap();

        assert_eq!(ids(transcript.merge(batch(3..=6)).unwrap()), vec![4, 5, 6]);
        assert_eq!(ids(transcript.messages()), vec![4, 5, 6]);
        assert_eq!(transcript.last_id(), 6);
    }

    proptest! {
        #[test]
        fn prop_chunked_merge_matches_whole(
            total in 0u64..60,
            cuts in prop::collection::vec(0u64..60, 0..8),
        ) {
            let mut bounds: Vec<u64> = cuts.into_iter().filter(|c| *c < total).collect();
            bounds.push(0);
            bounds.push(total);
            bounds.sort_unstable();
            bounds.dedup();

            let mut transcript = Transcript::new();
            for pair in bounds.windows(2) {
                transcript.merge(batch(pair[0] + 1..=pair[1])).unwrap();
            }

            prop_assert_eq!(ids(transcript.messages()), (1..=total).collect::<Vec<_>>());
            prop_assert_eq!(transcript.last_id(), total);
        }
    }
}

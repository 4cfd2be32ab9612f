//! The row log queue
//!
//! Messages get a monotonic sequence number at append time. Each
//! subscription consumes through its own cursor: `next_messages` returns
//! everything past the cursor, `ack` advances it. A message becomes
//! eligible for garbage collection once every subscription has acked past
//! it; `truncate_consumed` reclaims exactly those messages.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::VecDeque;

use vellum_core::error::{Error, Result};

use crate::subscription::Subscription;

/// One queued change message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// Monotonic sequence number within the log
    pub seq: u64,
    /// Row key the change applies to
    pub row_key: Vec<u8>,
    /// Opaque payload (the encoded change event)
    pub payload: Vec<u8>,
}

/// The row log abstraction consumed by the record store and processors
///
/// Thread safety: implementations must be safe to share across threads.
pub trait RowLog: Send + Sync {
    /// Id of this row log
    fn id(&self) -> &str;

    /// Append a message; returns its sequence number
    ///
    /// # Errors
    /// Returns an error if the log cannot accept the message.
    fn append(&self, row_key: &[u8], payload: Vec<u8>) -> Result<u64>;

    /// Register a subscription; last registration per id wins
    fn add_subscription(&self, subscription: Subscription);

    /// Remove a subscription; returns whether it existed
    fn remove_subscription(&self, subscription_id: &str) -> bool;

    /// The subscriptions in processing order: increasing `order_nr`,
    /// insertion order on ties
    fn subscriptions(&self) -> Vec<Subscription>;

    /// Messages past the subscription's cursor, oldest first
    ///
    /// # Errors
    /// Returns [`Error::UnknownSubscription`] for an unregistered id.
    fn next_messages(&self, subscription_id: &str, max: usize) -> Result<Vec<LogMessage>>;

    /// Advance the subscription's cursor through `seq`
    ///
    /// # Errors
    /// Returns [`Error::UnknownSubscription`] for an unregistered id.
    fn ack(&self, subscription_id: &str, seq: u64) -> Result<()>;

    /// Drop messages consumed by every subscription; returns how many
    ///
    /// With no subscriptions registered nothing is reclaimed: an
    /// unconsumed log must not silently discard history.
    fn truncate_consumed(&self) -> usize;
}

#[derive(Default)]
struct LogInner {
    next_seq: u64,
    messages: VecDeque<LogMessage>,
    // Insertion counter breaks order_nr ties deterministically.
    next_insertion: u64,
    subscriptions: Vec<(u64, Subscription)>,
    // Acked-through sequence per subscription id.
    cursors: HashMap<String, u64>,
}

/// In-memory row log
pub struct MemoryRowLog {
    id: String,
    inner: Mutex<LogInner>,
}

impl MemoryRowLog {
    /// Create an empty log with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(LogInner::default()),
        }
    }

    /// Number of messages currently retained
    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Whether no messages are retained
    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }
}

impl RowLog for MemoryRowLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn append(&self, row_key: &[u8], payload: Vec<u8>) -> Result<u64> {
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.messages.push_back(LogMessage {
            seq,
            row_key: row_key.to_vec(),
            payload,
        });
        Ok(seq)
    }

    fn add_subscription(&self, subscription: Subscription) {
        let mut inner = self.inner.lock();
        inner
            .subscriptions
            .retain(|(_, s)| s.subscription_id != subscription.subscription_id);
        inner
            .cursors
            .entry(subscription.subscription_id.clone())
            .or_insert(0);
        let insertion = inner.next_insertion;
        inner.next_insertion += 1;
        inner.subscriptions.push((insertion, subscription));
    }

    fn remove_subscription(&self, subscription_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscriptions.len();
        inner
            .subscriptions
            .retain(|(_, s)| s.subscription_id != subscription_id);
        inner.cursors.remove(subscription_id);
        inner.subscriptions.len() != before
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let inner = self.inner.lock();
        let mut ordered: Vec<_> = inner.subscriptions.clone();
        ordered.sort_by_key(|(insertion, s)| (s.order_nr, *insertion));
        ordered.into_iter().map(|(_, s)| s).collect()
    }

    fn next_messages(&self, subscription_id: &str, max: usize) -> Result<Vec<LogMessage>> {
        let inner = self.inner.lock();
        let cursor = *inner
            .cursors
            .get(subscription_id)
            .ok_or_else(|| Error::UnknownSubscription(subscription_id.to_string()))?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.seq > cursor)
            .take(max)
            .cloned()
            .collect())
    }

    fn ack(&self, subscription_id: &str, seq: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let cursor = inner
            .cursors
            .get_mut(subscription_id)
            .ok_or_else(|| Error::UnknownSubscription(subscription_id.to_string()))?;
        *cursor = (*cursor).max(seq);
        Ok(())
    }

    fn truncate_consumed(&self) -> usize {
        let mut inner = self.inner.lock();
        if inner.cursors.is_empty() {
            return 0;
        }
        let consumed_through = inner.cursors.values().copied().min().unwrap_or(0);
        let before = inner.messages.len();
        while inner
            .messages
            .front()
            .is_some_and(|m| m.seq <= consumed_through)
        {
            inner.messages.pop_front();
        }
        before - inner.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionKind;

    fn subscription(id: &str, order_nr: i32) -> Subscription {
        Subscription::new("records", id, SubscriptionKind::Remote, order_nr)
    }

    #[test]
    fn test_append_assigns_monotonic_sequences() {
        let log = MemoryRowLog::new("records");
        assert_eq!(log.append(b"r1", vec![1]).unwrap(), 1);
        assert_eq!(log.append(b"r2", vec![2]).unwrap(), 2);
        assert_eq!(log.append(b"r1", vec![3]).unwrap(), 3);
    }

    #[test]
    fn test_subscription_ordering() {
        let log = MemoryRowLog::new("records");
        log.add_subscription(subscription("c", 20));
        log.add_subscription(subscription("a", 10));
        log.add_subscription(subscription("b", 10));

        let ids: Vec<_> = log
            .subscriptions()
            .into_iter()
            .map(|s| s.subscription_id)
            .collect();
        // order_nr first; insertion order breaks the tie between a and b.
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let log = MemoryRowLog::new("records");
        log.add_subscription(subscription("a", 10));
        log.add_subscription(Subscription::new(
            "records",
            "a",
            SubscriptionKind::Local,
            5,
        ));
        let subs = log.subscriptions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].kind, SubscriptionKind::Local);
        assert_eq!(subs[0].order_nr, 5);
    }

    #[test]
    fn test_independent_cursors() {
        let log = MemoryRowLog::new("records");
        log.add_subscription(subscription("a", 1));
        log.add_subscription(subscription("b", 2));
        log.append(b"r", vec![1]).unwrap();
        log.append(b"r", vec![2]).unwrap();

        log.ack("a", 2).unwrap();
        assert!(log.next_messages("a", 10).unwrap().is_empty());
        assert_eq!(log.next_messages("b", 10).unwrap().len(), 2);

        assert!(matches!(
            log.next_messages("nope", 10),
            Err(Error::UnknownSubscription(_))
        ));
    }

    #[test]
    fn test_truncate_drops_only_fully_consumed() {
        let log = MemoryRowLog::new("records");
        log.add_subscription(subscription("a", 1));
        log.add_subscription(subscription("b", 2));
        for i in 0..4u8 {
            log.append(b"r", vec![i]).unwrap();
        }

        log.ack("a", 3).unwrap();
        log.ack("b", 2).unwrap();
        assert_eq!(log.truncate_consumed(), 2);
        assert_eq!(log.len(), 2);

        // Remaining messages start past the common cursor.
        let next = log.next_messages("b", 10).unwrap();
        assert_eq!(next.first().map(|m| m.seq), Some(3));
    }

    #[test]
    fn test_truncate_without_subscriptions_keeps_history() {
        let log = MemoryRowLog::new("records");
        log.append(b"r", vec![1]).unwrap();
        assert_eq!(log.truncate_consumed(), 0);
        assert_eq!(log.len(), 1);
    }
}

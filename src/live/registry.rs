//! Which live connections are listening to which poll.
//!
//! Each poll's subscriber set sits behind its own map entry, so mutating or
//! snapshotting one poll never waits on another unless they share a shard.
//! A poll entry exists exactly while its set is non-empty.

use crate::error::DeliveryError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

pub type PollId = i64;
pub type ConnectionId = Uuid;

/// Serialized event text, shared by every subscriber of one broadcast.
pub type Payload = Arc<str>;

/// Sending half of one live client session.
///
/// The socket task owns the receiving half; once it goes away every
/// `deliver` fails with [`DeliveryError::Closed`].
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Payload>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn deliver(&self, payload: Payload, timeout: Duration) -> Result<(), DeliveryError> {
        match tokio::time::timeout(timeout, self.tx.send(payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::TimedOut),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    polls: Arc<DashMap<PollId, HashMap<ConnectionId, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to the poll's set, creating the set if needed.
    /// Re-subscribing the same connection replaces the previous handle.
    pub fn subscribe(&self, poll_id: PollId, connection: Connection) {
        let connection_id = connection.id();
        let mut subscribers = self.polls.entry(poll_id).or_default();
        subscribers.insert(connection_id, connection);
        debug!(
            poll_id,
            %connection_id,
            subscribers = subscribers.len(),
            "connection subscribed"
        );
    }

    /// Removes the connection and drops the poll entry once it is empty.
    /// Returns whether anything was removed; absent entries are a no-op.
    pub fn unsubscribe(&self, poll_id: PollId, connection_id: ConnectionId) -> bool {
        let mut removed = false;
        let dropped_poll = self
            .polls
            .remove_if_mut(&poll_id, |_, subscribers| {
                removed = subscribers.remove(&connection_id).is_some();
                subscribers.is_empty()
            })
            .is_some();

        if removed {
            debug!(poll_id, %connection_id, dropped_poll, "connection unsubscribed");
        }
        removed
    }

    /// Copies the poll's current subscribers. The entry lock is released
    /// before this returns.
    pub fn subscribers_of(&self, poll_id: PollId) -> Vec<Connection> {
        self.polls
            .get(&poll_id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, poll_id: PollId, connection_id: ConnectionId) -> bool {
        self.polls
            .get(&poll_id)
            .is_some_and(|subscribers| subscribers.contains_key(&connection_id))
    }

    pub fn has_poll(&self, poll_id: PollId) -> bool {
        self.polls.contains_key(&poll_id)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.len()
    }

    pub fn connection_count(&self) -> usize {
        self.polls.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Connection, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(8);
        (Connection::new(tx), rx)
    }

    fn assert_no_empty_entries(registry: &ConnectionRegistry) {
        for entry in registry.polls.iter() {
            assert!(!entry.value().is_empty(), "poll {} has an empty set", entry.key());
        }
    }

    #[test]
    fn subscribe_creates_poll_entry_lazily() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.has_poll(7));

        let (conn, _rx) = connection();
        let id = conn.id();
        registry.subscribe(7, conn);

        assert!(registry.has_poll(7));
        assert!(registry.is_subscribed(7, id));
        assert_eq!(registry.subscribers_of(7).len(), 1);
    }

    #[test]
    fn duplicate_subscribe_keeps_one_handle() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connection();

        registry.subscribe(7, conn.clone());
        registry.subscribe(7, conn);

        assert_eq!(registry.subscribers_of(7).len(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn last_unsubscribe_drops_poll_entry() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let (a_id, b_id) = (a.id(), b.id());
        registry.subscribe(9, a);
        registry.subscribe(9, b);

        assert!(registry.unsubscribe(9, a_id));
        assert!(registry.has_poll(9));

        assert!(registry.unsubscribe(9, b_id));
        assert!(!registry.has_poll(9));
        assert!(registry.subscribers_of(9).is_empty());
    }

    #[test]
    fn unsubscribe_twice_is_same_as_once() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let a_id = a.id();
        registry.subscribe(3, a);
        registry.subscribe(3, b);

        assert!(registry.unsubscribe(3, a_id));
        let after_once = registry.subscribers_of(3).len();
        assert!(!registry.unsubscribe(3, a_id));

        assert_eq!(registry.subscribers_of(3).len(), after_once);
        assert!(registry.has_poll(3));
    }

    #[test]
    fn unsubscribe_unknown_poll_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.unsubscribe(42, Uuid::new_v4()));
        assert_eq!(registry.poll_count(), 0);
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connection();
        let a_id = a.id();
        registry.subscribe(1, a);

        let snapshot = registry.subscribers_of(1);
        registry.unsubscribe(1, a_id);

        assert_eq!(snapshot.len(), 1);
        assert!(!registry.has_poll(1));
    }

    #[test]
    fn polls_are_isolated() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let a_id = a.id();
        registry.subscribe(1, a);
        registry.subscribe(2, b);

        registry.unsubscribe(2, a_id);

        assert!(registry.is_subscribed(1, a_id));
        assert_eq!(registry.poll_count(), 2);
    }

    #[test]
    fn invariant_holds_over_mixed_sequence() {
        let registry = ConnectionRegistry::new();
        let handles: Vec<_> = (0..6).map(|_| connection()).collect();
        let ids: Vec<_> = handles.iter().map(|(c, _)| c.id()).collect();

        for (i, (conn, _)) in handles.iter().enumerate() {
            registry.subscribe((i % 3) as PollId, conn.clone());
            assert_no_empty_entries(&registry);
        }
        for (i, id) in ids.iter().enumerate().rev() {
            registry.unsubscribe((i % 3) as PollId, *id);
            assert_no_empty_entries(&registry);
            registry.unsubscribe((i % 3) as PollId, *id);
            assert_no_empty_entries(&registry);
        }

        assert_eq!(registry.poll_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_leaves_no_empty_entries() {
        let registry = ConnectionRegistry::new();
        let mut tasks = Vec::new();

        for worker in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..50 {
                    let (tx, _rx) = mpsc::channel(1);
                    let conn = Connection::new(tx);
                    let id = conn.id();
                    let poll_id = ((worker + round) % 4) as PollId;
                    registry.subscribe(poll_id, conn);
                    tokio::task::yield_now().await;
                    registry.unsubscribe(poll_id, id);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.poll_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn deliver_to_closed_connection_fails() {
        let (conn, rx) = connection();
        drop(rx);

        let result = conn.deliver(Arc::from("hello"), Duration::from_millis(50)).await;
        assert_eq!(result, Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn deliver_to_full_connection_times_out() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(tx);
        conn.deliver(Arc::from("first"), Duration::from_millis(50))
            .await
            .unwrap();

        let result = conn.deliver(Arc::from("second"), Duration::from_millis(20)).await;
        assert_eq!(result, Err(DeliveryError::TimedOut));
    }
}

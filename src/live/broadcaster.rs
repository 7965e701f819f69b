use crate::live::models::BroadcastEvent;
use crate::live::registry::{ConnectionRegistry, Payload, PollId};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Pushes events to every current subscriber of a poll.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Delivers `event` to the poll's subscribers and returns how many
    /// accepted it.
    ///
    /// Never fails: a subscriber that cannot be reached is unsubscribed and
    /// the remaining ones are still served. Callers announcing a database
    /// mutation must only call this after the transaction has committed.
    pub async fn broadcast(&self, poll_id: PollId, event: &BroadcastEvent) -> usize {
        let payload: Payload = match serde_json::to_string(event) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(poll_id, event = event.name(), "failed to serialize event: {}", e);
                return 0;
            }
        };

        let subscribers = self.registry.subscribers_of(poll_id);
        if subscribers.is_empty() {
            debug!(poll_id, event = event.name(), "no live subscribers");
            return 0;
        }

        let deliveries = subscribers.iter().map(|connection| {
            let payload = Arc::clone(&payload);
            async move {
                let outcome = connection.deliver(payload, self.send_timeout).await;
                (connection.id(), outcome)
            }
        });

        let mut delivered = 0;
        for (connection_id, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(poll_id, %connection_id, "dropping subscriber: {}", e);
                    self.registry.unsubscribe(poll_id, connection_id);
                }
            }
        }

        debug!(
            poll_id,
            event = event.name(),
            delivered,
            attempted = subscribers.len(),
            "broadcast finished"
        );
        delivered
    }
}

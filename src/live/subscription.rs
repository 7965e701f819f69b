//! Life of one live connection: subscribe, announce, wait, unsubscribe.

use crate::live::LiveHub;
use crate::live::models::BroadcastEvent;
use crate::live::registry::{Connection, ConnectionId, ConnectionRegistry, PollId};
use crate::polls::PollResponse;
use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Why a subscribed connection left its poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the client.
    ClientClosed,
    ReceiveError,
    /// Writing to the socket failed.
    SendFailed,
    /// The dispatcher dropped this subscriber after a failed delivery.
    Evicted,
}

/// Registry membership for one connection. Dropping it unsubscribes,
/// so every exit path leaves the poll exactly once.
#[derive(Debug)]
pub struct Subscription {
    registry: ConnectionRegistry,
    poll_id: PollId,
    connection_id: ConnectionId,
}

impl Subscription {
    pub fn attach(registry: &ConnectionRegistry, poll_id: PollId, connection: Connection) -> Self {
        let connection_id = connection.id();
        registry.subscribe(poll_id, connection);
        Self {
            registry: registry.clone(),
            poll_id,
            connection_id,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.poll_id, self.connection_id);
    }
}

/// Runs an accepted connection on `poll_id` until it closes.
///
/// `snapshot` is read only after the connection is subscribed, and the
/// resulting `connect` event goes out on its own task so a slow peer never
/// holds back this loop.
///
/// The registry holds the only long-lived sender for this connection, so
/// once the dispatcher evicts it the outbound queue drains and the socket is
/// closed from this side.
pub async fn serve_subscriber<S, R, E, F>(
    hub: &LiveHub,
    poll_id: PollId,
    snapshot: F,
    mut sink: S,
    mut stream: R,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    F: Future<Output = Option<PollResponse>> + Send + 'static,
{
    let (tx, mut outbound) = mpsc::channel(hub.outbound_buffer());
    let subscription = Subscription::attach(hub.registry(), poll_id, Connection::new(tx));
    let connection_id = subscription.connection_id();
    info!(poll_id, %connection_id, "live connection subscribed");

    let announcer = hub.clone();
    tokio::spawn(async move {
        match snapshot.await {
            Some(poll) => {
                announcer
                    .broadcast(poll_id, &BroadcastEvent::Connect { poll })
                    .await;
            }
            None => debug!(poll_id, "no snapshot to announce"),
        }
    });

    let reason = loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                Some(Err(e)) => {
                    debug!(poll_id, %connection_id, "receive error: {}", e);
                    break CloseReason::ReceiveError;
                }
                // clients have nothing to say; pings are answered by axum
                Some(Ok(_)) => {}
            },
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                        debug!(poll_id, %connection_id, "send error: {}", e);
                        break CloseReason::SendFailed;
                    }
                }
                None => break CloseReason::Evicted,
            },
        }
    };

    drop(subscription);

    if reason == CloseReason::Evicted {
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                reason: "subscriber fell behind".into(),
            })))
            .await;
    }
    let _ = sink.close().await;

    info!(poll_id, %connection_id, ?reason, "live connection closed");
    reason
}

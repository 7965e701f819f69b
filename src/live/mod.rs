pub mod broadcaster;
pub mod models;
pub mod poll_socket;
pub mod registry;
pub mod subscription;

pub use broadcaster::Broadcaster;
pub use models::*;
pub use poll_socket::poll_live;
pub use registry::{ConnectionRegistry, PollId};

use crate::config::LiveConfig;

/// Shared handle to the live poll channels. Cheap to clone; all clones see
/// the same registry.
#[derive(Debug, Clone)]
pub struct LiveHub {
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
    outbound_buffer: usize,
}

impl LiveHub {
    pub fn new(config: &LiveConfig) -> Self {
        let registry = ConnectionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone(), config.send_timeout);
        Self {
            registry,
            broadcaster,
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    pub async fn broadcast(&self, poll_id: PollId, event: &BroadcastEvent) -> usize {
        self.broadcaster.broadcast(poll_id, event).await
    }
}

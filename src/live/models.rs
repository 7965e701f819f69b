use crate::polls::{OptionResponse, PollResponse, UserSummary, VoteResponse};
use serde::{Deserialize, Serialize};

/// Vote mutation as announced to a poll's viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteActivity {
    pub vote: VoteResponse,
    pub option: OptionResponse,
    pub user: UserSummary,
}

/// Everything pushed over a live poll connection.
///
/// Serialized as `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum BroadcastEvent {
    /// A viewer joined; carries the full poll state.
    Connect { poll: PollResponse },
    /// A vote was committed.
    Vote(VoteActivity),
    /// A vote was withdrawn.
    Delete(VoteActivity),
}

impl BroadcastEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::Connect { .. } => "connect",
            BroadcastEvent::Vote(_) => "vote",
            BroadcastEvent::Delete(_) => "delete",
        }
    }
}

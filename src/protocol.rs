use crate::error::PollError;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Events a connected participant may send.
/// Identity is never part of the payload; it comes from the connection's token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Nominate {
        text: String,
    },
    RemoveNomination {
        id: NominationId,
    },
    /// Admin only
    RemoveParticipant {
        id: ParticipantId,
    },
    /// Admin only
    StartVote,
    SubmitRankings {
        rankings: Vec<NominationId>,
    },
    /// Admin only
    ClosePoll,
    /// Admin only
    CancelPoll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full current poll state. Replaces whatever the client held before.
    PollUpdated { poll: Poll },
    /// The poll was deleted; clients should drop their local state.
    PollCancelled,
    /// Sent only to the connection whose request failed.
    Exception { kind: String, message: String },
}

impl From<PollError> for ServerMessage {
    fn from(err: PollError) -> Self {
        ServerMessage::Exception {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

//! Realtime event dispatch
//!
//! Each inbound event runs its guards (admin check, input validation), calls
//! into the poll state, then pushes the outcome to the room. Failures are
//! returned to the caller as an `exception` for the originating connection only.

use crate::auth::{require_admin, Session};
use crate::error::PollResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::Poll;
use crate::validation;
use std::sync::Arc;

/// What a successful event means for the room
#[derive(Debug, Clone, PartialEq)]
pub enum RoomUpdate {
    /// Push this snapshot to every member
    Snapshot(Poll),
    /// Poll is gone; members drop their local state
    Cancelled,
    /// Nothing changed, nothing to send
    Unchanged,
}

impl RoomUpdate {
    fn into_message(self) -> Option<ServerMessage> {
        match self {
            RoomUpdate::Snapshot(poll) => Some(ServerMessage::PollUpdated { poll }),
            RoomUpdate::Cancelled => Some(ServerMessage::PollCancelled),
            RoomUpdate::Unchanged => None,
        }
    }
}

/// Handle one client event and return the message for the sender, if any.
///
/// On success the room (sender included) receives the update and `None` is
/// returned. On failure nothing is broadcast and the error envelope is returned.
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match dispatch(msg, session, state).await {
        Ok(update) => {
            broadcast_update(state, &session.poll_id, update);
            None
        }
        Err(e) => {
            tracing::warn!(
                poll_id = %session.poll_id,
                user_id = %session.user_id,
                kind = e.kind(),
                "Event rejected: {}",
                e
            );
            Some(ServerMessage::from(e))
        }
    }
}

/// Send a room update to every connection of a poll.
pub fn broadcast_update(state: &AppState, poll_id: &str, update: RoomUpdate) {
    if let Some(msg) = update.into_message() {
        let delivered = state.rooms.broadcast(poll_id, &msg);
        tracing::debug!(poll_id, delivered, "Broadcast room update");
    }
}

async fn dispatch(
    msg: ClientMessage,
    session: &Session,
    state: &Arc<AppState>,
) -> PollResult<RoomUpdate> {
    let poll_id = session.poll_id.as_str();

    match msg {
        ClientMessage::Nominate { text } => {
            let text = validation::nomination_text(&text)?;
            let poll = state.add_nomination(poll_id, &session.user_id, text).await?;
            Ok(RoomUpdate::Snapshot(poll))
        }

        ClientMessage::RemoveNomination { id } => {
            require_admin(state.store.as_ref(), session).await?;
            let poll = state.remove_nomination(poll_id, &id).await?;
            Ok(RoomUpdate::Snapshot(poll))
        }

        ClientMessage::RemoveParticipant { id } => {
            require_admin(state.store.as_ref(), session).await?;
            match state.remove_participant(poll_id, &id).await? {
                Some(poll) => Ok(RoomUpdate::Snapshot(poll)),
                None => Ok(RoomUpdate::Unchanged),
            }
        }

        ClientMessage::StartVote => {
            require_admin(state.store.as_ref(), session).await?;
            let poll = state.start_poll(poll_id).await?;
            Ok(RoomUpdate::Snapshot(poll))
        }

        ClientMessage::SubmitRankings { rankings } => {
            let poll = state
                .submit_rankings(poll_id, &session.user_id, rankings)
                .await?;
            Ok(RoomUpdate::Snapshot(poll))
        }

        ClientMessage::ClosePoll => {
            require_admin(state.store.as_ref(), session).await?;
            let poll = state.close_poll(poll_id).await?;
            Ok(RoomUpdate::Snapshot(poll))
        }

        ClientMessage::CancelPoll => {
            require_admin(state.store.as_ref(), session).await?;
            state.cancel_poll(poll_id).await?;
            Ok(RoomUpdate::Cancelled)
        }
    }
}

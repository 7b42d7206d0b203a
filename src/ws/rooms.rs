//! Room bookkeeping: which live connections belong to which poll.
//!
//! Membership changes only when a connection is accepted or closes, or when a
//! connection falls so far behind that its queue fills up. Such a connection is
//! dropped from the room, which ends its socket task; the client reconnects and
//! receives a fresh snapshot.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::ServerMessage;
use crate::types::PollId;

/// Messages buffered per connection before it counts as stalled
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

pub type ConnectionId = u64;

/// Sender half of a connection's outbound queue. The room owns it, so removing
/// a connection from its room closes the queue.
pub type ConnectionSender = mpsc::Sender<ServerMessage>;
pub type ConnectionReceiver = mpsc::Receiver<ServerMessage>;

/// Create the outbound queue for one connection.
pub fn connection_channel() -> (ConnectionSender, ConnectionReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<PollId, HashMap<ConnectionId, ConnectionSender>>,
    next_id: AtomicU64,
}

/// Queue `msg` without waiting. `false` means the connection should be dropped.
fn deliver(poll_id: &str, conn_id: ConnectionId, sender: &ConnectionSender, msg: ServerMessage) -> bool {
    match sender.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(poll_id, conn_id, "Outbound queue full, dropping connection");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room for `poll_id`, creating the room if needed.
    pub fn join(&self, poll_id: &str, sender: ConnectionSender) -> ConnectionId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let size = {
            let mut room = self.rooms.entry(poll_id.to_string()).or_default();
            room.insert(conn_id, sender);
            room.len()
        };
        tracing::debug!(poll_id, conn_id, room_size = size, "Connection joined room");
        conn_id
    }

    /// Remove a connection. Empty rooms are dropped. Returns the remaining size.
    pub fn leave(&self, poll_id: &str, conn_id: ConnectionId) -> usize {
        let remaining = match self.rooms.get_mut(poll_id) {
            Some(mut room) => {
                room.remove(&conn_id);
                room.len()
            }
            None => 0,
        };
        if remaining == 0 {
            self.rooms.remove_if(poll_id, |_, room| room.is_empty());
        }
        tracing::debug!(poll_id, conn_id, room_size = remaining, "Connection left room");
        remaining
    }

    /// Push a message to every connection in a room. Connections that cannot
    /// take it are removed. Returns how many accepted it.
    pub fn broadcast(&self, poll_id: &str, msg: &ServerMessage) -> usize {
        let Some(mut room) = self.rooms.get_mut(poll_id) else {
            return 0;
        };
        room.retain(|conn_id, sender| deliver(poll_id, *conn_id, sender, msg.clone()));
        room.len()
    }

    /// Push a message to one connection only. A stalled connection is removed.
    pub fn send_to(&self, poll_id: &str, conn_id: ConnectionId, msg: ServerMessage) -> bool {
        let Some(mut room) = self.rooms.get_mut(poll_id) else {
            return false;
        };
        let Some(sender) = room.get(&conn_id) else {
            return false;
        };
        let delivered = deliver(poll_id, conn_id, sender, msg);
        if !delivered {
            room.remove(&conn_id);
        }
        delivered
    }
}

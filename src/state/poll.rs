use super::AppState;
use crate::auth::Session;
use crate::error::{PollError, PollResult};
use crate::types::*;
use crate::validation::POLL_ID_LENGTH;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Safe character set for poll codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Give up after this many ID collisions in a row
const MAX_ID_ATTEMPTS: usize = 8;

fn generate_poll_id() -> PollId {
    let mut rng = rand::rng();
    (0..POLL_ID_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

pub(crate) fn generate_id() -> String {
    ulid::Ulid::new().to_string()
}

/// A poll snapshot plus the caller's access token, returned by create and join
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollAccess {
    pub poll: Poll,
    pub access_token: String,
}

impl AppState {
    /// Create a poll administered by a new participant named `name`.
    /// Inputs are expected to be validated already.
    pub async fn create_poll(
        &self,
        topic: String,
        votes_per_voter: u32,
        name: String,
    ) -> PollResult<PollAccess> {
        let admin_id = generate_id();

        let mut attempts = 0;
        let poll = loop {
            attempts += 1;
            let candidate = Poll::new(
                generate_poll_id(),
                topic.clone(),
                votes_per_voter,
                admin_id.clone(),
            );
            match self.store.create(candidate).await {
                Ok(poll) => break poll,
                Err(PollError::Conflict(_)) if attempts < MAX_ID_ATTEMPTS => {
                    tracing::warn!(attempts, "Poll ID collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(poll_id = %poll.id, admin_id = %admin_id, "Poll created");

        let access_token = self.keys.issue(&admin_id, &poll.id, &name)?;
        Ok(PollAccess { poll, access_token })
    }

    /// Issue a token for a new participant of an existing poll.
    /// The participant is added to the roster once their connection comes up.
    pub async fn join_poll(&self, poll_id: &str, name: String) -> PollResult<PollAccess> {
        let poll = self.store.get(poll_id).await?;
        let user_id = generate_id();

        tracing::info!(poll_id = %poll.id, user_id = %user_id, "Participant joining poll");

        let access_token = self.keys.issue(&user_id, &poll.id, &name)?;
        Ok(PollAccess { poll, access_token })
    }

    /// Re-enter a poll with an existing identity.
    pub async fn rejoin_poll(&self, session: &Session) -> PollResult<Poll> {
        tracing::info!(
            poll_id = %session.poll_id,
            user_id = %session.user_id,
            name = %session.name,
            "Participant rejoining poll"
        );
        self.add_participant(&session.poll_id, &session.user_id, &session.name)
            .await
    }

    pub async fn get_poll(&self, poll_id: &str) -> PollResult<Poll> {
        self.store.get(poll_id).await
    }

    /// Open → Voting. Calling it again is a no-op.
    pub async fn start_poll(&self, poll_id: &str) -> PollResult<Poll> {
        tracing::info!(poll_id, "Starting vote");
        self.store.start(poll_id).await
    }

    /// Delete the poll outright. Everything after this sees NotFound.
    pub async fn cancel_poll(&self, poll_id: &str) -> PollResult<()> {
        tracing::info!(poll_id, "Cancelling poll");
        self.store.delete(poll_id).await?;
        self.close_locks.remove(poll_id);
        Ok(())
    }
}

use super::AppState;
use crate::error::{PollError, PollResult};
use crate::types::*;

impl AppState {
    /// Upsert a participant. Safe to call on every (re)connect.
    pub async fn add_participant(
        &self,
        poll_id: &str,
        user_id: &str,
        name: &str,
    ) -> PollResult<Poll> {
        tracing::debug!(poll_id, user_id, name, "Adding participant");
        self.store.add_participant(poll_id, user_id, name).await
    }

    /// Remove a participant while the poll is still Open.
    ///
    /// Once voting has started the roster is frozen: returns `Ok(None)` and
    /// nothing changes, so callers must not broadcast.
    pub async fn remove_participant(
        &self,
        poll_id: &str,
        user_id: &str,
    ) -> PollResult<Option<Poll>> {
        let removed = self.store.remove_participant(poll_id, user_id).await?;
        if removed.is_none() {
            tracing::debug!(poll_id, user_id, "Voting started, keeping participant");
        } else {
            tracing::debug!(poll_id, user_id, "Removed participant");
        }
        Ok(removed)
    }

    /// Connection-closed path. Same rules as `remove_participant`, but a poll
    /// that no longer exists is silently skipped.
    pub async fn disconnect(&self, poll_id: &str, user_id: &str) -> Option<Poll> {
        match self.remove_participant(poll_id, user_id).await {
            Ok(poll) => poll,
            Err(PollError::NotFound(_)) => {
                tracing::debug!(poll_id, user_id, "Poll gone, nothing to update on disconnect");
                None
            }
            Err(e) => {
                tracing::warn!(poll_id, user_id, error = %e, "Failed to update poll on disconnect");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::state::test_support::{racing_state, state, Race};

    #[tokio::test]
    async fn test_add_participant_is_idempotent() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;

        state.add_participant(id, "p1", "Bob").await.unwrap();
        let poll = state.add_participant(id, "p1", "Bob").await.unwrap();
        assert_eq!(poll.participants.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_participant_before_start() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;
        state.add_participant(id, "p1", "Bob").await.unwrap();

        let poll = state.remove_participant(id, "p1").await.unwrap();
        assert!(poll.unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn test_remove_participant_after_start_is_noop() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;
        state.add_participant(id, "p1", "Bob").await.unwrap();
        let before = state.start_poll(id).await.unwrap();

        let result = state.remove_participant(id, "p1").await.unwrap();
        assert!(result.is_none());
        assert_eq!(state.get_poll(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_disconnect_on_missing_poll() {
        let state = state();
        assert!(state.disconnect("ZZZZZZ", "p1").await.is_none());
    }

    #[tokio::test]
    async fn test_start_racing_removal_keeps_participant() {
        let state = racing_state(Race::StartBeforeParticipantRemoval);
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;
        state.add_participant(id, "p1", "Bob").await.unwrap();

        assert!(state.remove_participant(id, "p1").await.unwrap().is_none());

        let poll = state.get_poll(id).await.unwrap();
        assert!(poll.has_started);
        assert_eq!(poll.participants["p1"], "Bob");
    }
}

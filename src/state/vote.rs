use super::score::get_results;
use super::AppState;
use crate::error::{PollError, PollResult};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Store a participant's ranking, replacing any earlier submission.
    /// Only accepted while the poll is in Voting.
    pub async fn submit_rankings(
        &self,
        poll_id: &str,
        user_id: &str,
        rankings: Vec<NominationId>,
    ) -> PollResult<Poll> {
        tracing::debug!(poll_id, user_id, count = rankings.len(), "Submitting rankings");
        self.store.add_rankings(poll_id, user_id, rankings).await
    }

    /// Voting → Closed.
    ///
    /// Results are computed once. Any later call, including one racing with the
    /// first, gets the stored results back untouched.
    pub async fn close_poll(&self, poll_id: &str) -> PollResult<Poll> {
        let lock = self.close_lock(poll_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.close_locked(poll_id).await
        };

        // Drop the lock entry unless another close still holds it. Whoever
        // releases last sees the map as the only owner.
        drop(lock);
        self.close_locks
            .remove_if(poll_id, |_, entry| Arc::strong_count(entry) == 1);
        outcome
    }

    async fn close_locked(&self, poll_id: &str) -> PollResult<Poll> {
        let poll = self.store.get(poll_id).await?;

        if poll.results.is_some() {
            tracing::debug!(poll_id, "Poll already closed, returning stored results");
            return Ok(poll);
        }

        if !poll.has_started {
            return Err(PollError::Conflict(
                "Cannot close a poll before voting has started".to_string(),
            ));
        }

        let results = get_results(&poll.rankings, &poll.nominations, poll.votes_per_voter);
        tracing::info!(
            poll_id,
            voters = poll.rankings.len(),
            ranked = results.len(),
            "Closing poll with computed results"
        );

        self.store.add_results(poll_id, results).await
    }
}

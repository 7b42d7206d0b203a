use super::poll::generate_id;
use super::AppState;
use crate::error::PollResult;
use crate::types::*;

impl AppState {
    /// Add a nomination under a fresh ID. `text` is expected to be validated.
    /// Rejected with a conflict once voting has started.
    pub async fn add_nomination(&self, poll_id: &str, user_id: &str, text: String) -> PollResult<Poll> {
        let nomination_id = generate_id();
        tracing::debug!(poll_id, user_id, nomination_id = %nomination_id, "Adding nomination");

        self.store
            .add_nomination(
                poll_id,
                &nomination_id,
                Nomination {
                    user_id: user_id.to_string(),
                    text,
                },
            )
            .await
    }

    pub async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll> {
        tracing::debug!(poll_id, nomination_id, "Removing nomination");
        self.store.remove_nomination(poll_id, nomination_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PollError;
    use crate::state::test_support::{racing_state, state, Race};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_and_remove_nomination() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;

        let poll = state.add_nomination(id, "p1", "Tacos".into()).await.unwrap();
        assert_eq!(poll.nominations.len(), 1);
        let (nomination_id, nomination) = poll.nominations.iter().next().unwrap();
        assert_eq!(nomination.user_id, "p1");
        assert_eq!(nomination.text, "Tacos");

        let poll = state.remove_nomination(id, nomination_id).await.unwrap();
        assert!(poll.nominations.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_nomination() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();

        let result = state.remove_nomination(&created.poll.id, "nope").await;
        assert!(matches!(result, Err(PollError::Validation(_))));
    }

    #[tokio::test]
    async fn test_nominations_frozen_after_start() {
        let state = state();
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;
        let poll = state.add_nomination(id, "p1", "Tacos".into()).await.unwrap();
        let nomination_id = poll.nominations.keys().next().unwrap().clone();
        state.start_poll(id).await.unwrap();

        assert!(matches!(
            state.add_nomination(id, "p1", "Pizza".into()).await,
            Err(PollError::Conflict(_))
        ));
        assert!(matches!(
            state.remove_nomination(id, &nomination_id).await,
            Err(PollError::Conflict(_))
        ));
        assert_eq!(state.get_poll(id).await.unwrap().nominations.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_nominations_not_lost() {
        let state = Arc::new(state());
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = created.poll.id;

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let state = state.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    state
                        .add_nomination(&id, &format!("p{}", i), format!("idea {}", i))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(state.get_poll(&id).await.unwrap().nominations.len(), 50);
    }

    #[tokio::test]
    async fn test_start_racing_removal_keeps_nomination() {
        let state = racing_state(Race::StartAndRankBeforeRemoval {
            participant: "voter".into(),
        });
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();
        let id = &created.poll.id;
        let poll = state.add_nomination(id, "p1", "Tacos".into()).await.unwrap();
        let nomination_id = poll.nominations.keys().next().unwrap().clone();

        // Voting starts and "voter" ranks the nomination just before the removal lands
        let result = state.remove_nomination(id, &nomination_id).await;
        assert!(matches!(result, Err(PollError::Conflict(_))));

        let poll = state.get_poll(id).await.unwrap();
        assert!(poll.has_started);
        assert_eq!(poll.rankings["voter"], vec![nomination_id.clone()]);
        assert!(poll
            .rankings
            .values()
            .flatten()
            .all(|nid| poll.nominations.contains_key(nid)));
    }

    #[tokio::test]
    async fn test_start_racing_nomination_is_rejected() {
        let state = racing_state(Race::StartBeforeNominate);
        let created = state
            .create_poll("Topic".into(), 2, "Ada".into())
            .await
            .unwrap();

        let result = state
            .add_nomination(&created.poll.id, "p1", "Tacos".into())
            .await;
        assert!(matches!(result, Err(PollError::Conflict(_))));
        assert!(state
            .get_poll(&created.poll.id)
            .await
            .unwrap()
            .nominations
            .is_empty());
    }
}

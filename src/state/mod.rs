//! Poll lifecycle coordination.
//!
//! Every state transition goes through `AppState`, split by concern:
//! - `poll`: create / join / rejoin / start / cancel
//! - `participant`: roster changes and disconnects
//! - `nomination`: adding and removing nominations
//! - `vote`: rankings and closing
//! - `score`: the pure scoring function used on close
//!
//! No method keeps a private copy of a poll across calls; each reads or mutates
//! the record through the store.

mod nomination;
mod participant;
mod poll;
pub mod score;
mod vote;

pub use poll::PollAccess;

use crate::auth::TokenKeys;
use crate::store::{MemoryStore, PollStore};
use crate::types::PollId;
use crate::ws::rooms::RoomRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub keys: TokenKeys,
    /// Live connections grouped by poll
    pub rooms: RoomRegistry,
    /// Serializes close attempts per poll so results are computed once
    close_locks: DashMap<PollId, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, keys: TokenKeys) -> Self {
        Self {
            store,
            keys,
            rooms: RoomRegistry::new(),
            close_locks: DashMap::new(),
        }
    }

    /// State backed by a fresh in-memory store; tokens live as long as polls.
    pub fn in_memory(poll_duration: Duration, secret: &[u8]) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(poll_duration)),
            TokenKeys::new(secret, poll_duration),
        )
    }

    fn close_lock(&self, poll_id: &str) -> Arc<Mutex<()>> {
        self.close_locks
            .entry(poll_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::PollResult;
    use crate::types::*;
    use async_trait::async_trait;

    pub fn state() -> AppState {
        AppState::in_memory(Duration::from_secs(600), b"test-secret")
    }

    /// A competing write that lands just before a guarded store call.
    #[derive(Debug, Clone)]
    pub enum Race {
        StartBeforeNominate,
        /// Start voting, then rank the nomination about to be removed
        StartAndRankBeforeRemoval { participant: ParticipantId },
        StartBeforeParticipantRemoval,
        /// Close with empty results right before rankings are stored
        CloseBeforeRanking,
    }

    /// In-memory store that runs its `Race` once, in front of the matching call.
    pub struct RacingStore {
        inner: MemoryStore,
        race: std::sync::Mutex<Option<Race>>,
    }

    impl RacingStore {
        fn take(&self, matches: impl Fn(&Race) -> bool) -> Option<Race> {
            let mut race = self.race.lock().unwrap();
            if race.as_ref().is_some_and(matches) {
                race.take()
            } else {
                None
            }
        }
    }

    pub fn racing_state(race: Race) -> AppState {
        let store = RacingStore {
            inner: MemoryStore::new(Duration::from_secs(600)),
            race: std::sync::Mutex::new(Some(race)),
        };
        AppState::new(
            Arc::new(store),
            TokenKeys::new(b"test-secret", Duration::from_secs(600)),
        )
    }

    #[async_trait]
    impl PollStore for RacingStore {
        async fn create(&self, poll: Poll) -> PollResult<Poll> {
            self.inner.create(poll).await
        }

        async fn get(&self, poll_id: &str) -> PollResult<Poll> {
            self.inner.get(poll_id).await
        }

        async fn add_participant(
            &self,
            poll_id: &str,
            participant_id: &str,
            name: &str,
        ) -> PollResult<Poll> {
            self.inner.add_participant(poll_id, participant_id, name).await
        }

        async fn remove_participant(
            &self,
            poll_id: &str,
            participant_id: &str,
        ) -> PollResult<Option<Poll>> {
            if self
                .take(|r| matches!(r, Race::StartBeforeParticipantRemoval))
                .is_some()
            {
                self.inner.start(poll_id).await?;
            }
            self.inner.remove_participant(poll_id, participant_id).await
        }

        async fn add_nomination(
            &self,
            poll_id: &str,
            nomination_id: &str,
            nomination: Nomination,
        ) -> PollResult<Poll> {
            if self.take(|r| matches!(r, Race::StartBeforeNominate)).is_some() {
                self.inner.start(poll_id).await?;
            }
            self.inner
                .add_nomination(poll_id, nomination_id, nomination)
                .await
        }

        async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll> {
            if let Some(Race::StartAndRankBeforeRemoval { participant }) =
                self.take(|r| matches!(r, Race::StartAndRankBeforeRemoval { .. }))
            {
                self.inner.start(poll_id).await?;
                self.inner
                    .add_rankings(poll_id, &participant, vec![nomination_id.to_string()])
                    .await?;
            }
            self.inner.remove_nomination(poll_id, nomination_id).await
        }

        async fn start(&self, poll_id: &str) -> PollResult<Poll> {
            self.inner.start(poll_id).await
        }

        async fn add_rankings(
            &self,
            poll_id: &str,
            participant_id: &str,
            rankings: Vec<NominationId>,
        ) -> PollResult<Poll> {
            if self.take(|r| matches!(r, Race::CloseBeforeRanking)).is_some() {
                self.inner.add_results(poll_id, Vec::new()).await?;
            }
            self.inner
                .add_rankings(poll_id, participant_id, rankings)
                .await
        }

        async fn add_results(&self, poll_id: &str, results: Results) -> PollResult<Poll> {
            self.inner.add_results(poll_id, results).await
        }

        async fn delete(&self, poll_id: &str) -> PollResult<()> {
            self.inner.delete(poll_id).await
        }
    }
}

use super::{ensure_nominations_open, ensure_rankable, PollStore};
use crate::error::{PollError, PollResult};
use crate::types::*;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

struct StoredPoll {
    poll: Poll,
    expires_at: Instant,
}

impl StoredPoll {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process poll store.
///
/// Each record sits behind its map shard lock, so an update holds the lock only
/// while one field is changed and never across an await point.
pub struct MemoryStore {
    polls: DashMap<PollId, StoredPoll>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            polls: DashMap::new(),
            ttl,
        }
    }

    /// Number of records held, expired ones included until swept
    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.polls.retain(|_, stored| {
            let keep = !stored.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn evict_if_expired(&self, poll_id: &str, now: Instant) {
        self.polls.remove_if(poll_id, |_, stored| stored.is_expired(now));
    }

    /// Run `apply` against a live record while holding its shard lock.
    fn with_live<T, F>(&self, poll_id: &str, apply: F) -> PollResult<T>
    where
        F: FnOnce(&mut Poll) -> PollResult<T>,
    {
        let now = Instant::now();
        if let Some(mut stored) = self.polls.get_mut(poll_id) {
            if !stored.is_expired(now) {
                return apply(&mut stored.poll);
            }
        }
        self.evict_if_expired(poll_id, now);
        Err(PollError::poll_not_found(poll_id))
    }

    /// Apply a field-level mutation to a live record and return the new snapshot.
    /// If `apply` fails the record is left as it was.
    fn update<F>(&self, poll_id: &str, apply: F) -> PollResult<Poll>
    where
        F: FnOnce(&mut Poll) -> PollResult<()>,
    {
        self.with_live(poll_id, |poll| {
            apply(poll)?;
            Ok(poll.clone())
        })
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn create(&self, poll: Poll) -> PollResult<Poll> {
        let now = Instant::now();
        let expires_at = now.checked_add(self.ttl).ok_or_else(|| {
            PollError::Internal(format!("poll TTL of {:?} is out of range", self.ttl))
        })?;
        let stored = StoredPoll {
            poll: poll.clone(),
            expires_at,
        };

        match self.polls.entry(poll.id.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Err(PollError::Conflict(format!(
                        "Poll with ID {} already exists",
                        poll.id
                    )));
                }
                occupied.insert(stored);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(stored);
            }
        }

        tracing::debug!(poll_id = %poll.id, ttl_secs = self.ttl.as_secs(), "Poll record created");
        Ok(poll)
    }

    async fn get(&self, poll_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |_| Ok(()))
    }

    async fn add_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
        name: &str,
    ) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            poll.participants
                .insert(participant_id.to_string(), name.to_string());
            Ok(())
        })
    }

    async fn remove_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> PollResult<Option<Poll>> {
        self.with_live(poll_id, |poll| {
            if poll.has_started {
                return Ok(None);
            }
            poll.participants.remove(participant_id);
            Ok(Some(poll.clone()))
        })
    }

    async fn add_nomination(
        &self,
        poll_id: &str,
        nomination_id: &str,
        nomination: Nomination,
    ) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            ensure_nominations_open(poll)?;
            poll.nominations
                .insert(nomination_id.to_string(), nomination);
            Ok(())
        })
    }

    async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            ensure_nominations_open(poll)?;
            match poll.nominations.remove(nomination_id) {
                Some(_) => Ok(()),
                None => Err(PollError::Validation(format!(
                    "nomination {} does not exist",
                    nomination_id
                ))),
            }
        })
    }

    async fn start(&self, poll_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            poll.has_started = true;
            Ok(())
        })
    }

    async fn add_rankings(
        &self,
        poll_id: &str,
        participant_id: &str,
        rankings: Vec<NominationId>,
    ) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            ensure_rankable(poll, &rankings)?;
            poll.rankings.insert(participant_id.to_string(), rankings);
            Ok(())
        })
    }

    async fn add_results(&self, poll_id: &str, results: Results) -> PollResult<Poll> {
        self.update(poll_id, |poll| {
            if !poll.has_started {
                return Err(PollError::Conflict(
                    "Cannot close a poll before voting has started".to_string(),
                ));
            }
            if poll.results.is_none() {
                poll.results = Some(results);
            }
            Ok(())
        })
    }

    async fn delete(&self, poll_id: &str) -> PollResult<()> {
        let now = Instant::now();
        match self.polls.remove(poll_id) {
            Some((_, stored)) if !stored.is_expired(now) => Ok(()),
            _ => Err(PollError::poll_not_found(poll_id)),
        }
    }
}

/// Spawn a background task that periodically drops expired polls.
/// Reads already treat expired records as missing; this only reclaims memory.
pub fn spawn_expiry_sweeper(store: Arc<MemoryStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired();
            if removed > 0 {
                tracing::info!(removed, remaining = store.len(), "Swept expired polls");
            }
        }
    })
}

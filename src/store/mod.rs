//! Keyed storage for poll records.
//!
//! Every mutating call is a field-level update applied atomically against the
//! current record. Implementations must never read a whole record, modify it
//! outside the store, and write it back, since two concurrent callers would then
//! lose one of the updates.

mod memory;

pub use memory::{spawn_expiry_sweeper, MemoryStore};

use crate::error::{PollError, PollResult};
use crate::types::*;
use crate::validation;
use async_trait::async_trait;

/// Nominations may only change while the poll is Open, so a stored ranking
/// never points at a nomination that has since disappeared.
fn ensure_nominations_open(poll: &Poll) -> PollResult<()> {
    if poll.has_started {
        return Err(PollError::Conflict(
            "Nominations cannot change once voting has started".to_string(),
        ));
    }
    Ok(())
}

/// Rankings are accepted in Voting only, and must be valid for this poll.
fn ensure_rankable(poll: &Poll, rankings: &[NominationId]) -> PollResult<()> {
    match poll.phase() {
        PollPhase::Open => Err(PollError::Conflict(
            "Participants cannot rank until the poll has started".to_string(),
        )),
        PollPhase::Closed => Err(PollError::Conflict("Poll is already closed".to_string())),
        PollPhase::Voting => validation::rankings(poll, rankings),
    }
}

/// Storage contract for poll records.
///
/// All operations fail with `PollError::NotFound` when the poll is absent or
/// has outlived its TTL. The TTL is fixed at creation and is not extended by
/// later mutations.
///
/// Phase preconditions are checked inside the same atomic step as the write
/// they guard. A `start` or close racing with a nomination change or ranking
/// therefore either lands first and causes a rejection, or lands after.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a new record. Fails with `PollError::Conflict` if the ID is taken.
    async fn create(&self, poll: Poll) -> PollResult<Poll>;

    async fn get(&self, poll_id: &str) -> PollResult<Poll>;

    /// Upsert a participant's display name.
    async fn add_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
        name: &str,
    ) -> PollResult<Poll>;

    /// Remove a participant while the poll is Open. Once voting has started the
    /// roster is frozen and `Ok(None)` is returned with the record untouched.
    async fn remove_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> PollResult<Option<Poll>>;

    /// Fails with `PollError::Conflict` once voting has started.
    async fn add_nomination(
        &self,
        poll_id: &str,
        nomination_id: &str,
        nomination: Nomination,
    ) -> PollResult<Poll>;

    /// Fails with `PollError::Conflict` once voting has started and with
    /// `PollError::Validation` if the nomination does not exist.
    async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll>;

    /// Set `has_started`. Idempotent.
    async fn start(&self, poll_id: &str) -> PollResult<Poll>;

    /// Replace a participant's ranking list. Fails with `PollError::Conflict`
    /// outside Voting and with `PollError::Validation` for an invalid list.
    async fn add_rankings(
        &self,
        poll_id: &str,
        participant_id: &str,
        rankings: Vec<NominationId>,
    ) -> PollResult<Poll>;

    /// Store results if none are stored yet. An existing value is never
    /// overwritten; the returned poll always carries the stored results.
    /// Fails with `PollError::Conflict` if voting never started.
    async fn add_results(&self, poll_id: &str, results: Results) -> PollResult<Poll>;

    async fn delete(&self, poll_id: &str) -> PollResult<()>;
}

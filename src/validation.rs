//! Input validators run before a request reaches the poll state.
//!
//! Each returns the cleaned value or a `PollError::Validation`.

use crate::error::{PollError, PollResult};
use crate::types::{NominationId, Poll};
use std::collections::HashSet;

pub const POLL_ID_LENGTH: usize = 6;
pub const MAX_TOPIC_CHARS: usize = 100;
pub const MAX_NAME_CHARS: usize = 25;
pub const MAX_NOMINATION_CHARS: usize = 100;
pub const MIN_VOTES_PER_VOTER: u32 = 1;
pub const MAX_VOTES_PER_VOTER: u32 = 5;

fn bounded_text(field: &str, value: &str, min: usize, max: usize) -> PollResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(PollError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(trimmed.to_string())
}

pub fn topic(value: &str) -> PollResult<String> {
    bounded_text("topic", value, 1, MAX_TOPIC_CHARS)
}

pub fn name(value: &str) -> PollResult<String> {
    bounded_text("name", value, 1, MAX_NAME_CHARS)
}

pub fn nomination_text(value: &str) -> PollResult<String> {
    bounded_text("text", value, 1, MAX_NOMINATION_CHARS)
}

pub fn poll_id(value: &str) -> PollResult<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.chars().count() != POLL_ID_LENGTH {
        return Err(PollError::Validation(format!(
            "pollID must be exactly {} characters",
            POLL_ID_LENGTH
        )));
    }
    Ok(normalized)
}

pub fn votes_per_voter(value: u32) -> PollResult<u32> {
    if !(MIN_VOTES_PER_VOTER..=MAX_VOTES_PER_VOTER).contains(&value) {
        return Err(PollError::Validation(format!(
            "votesPerVoter must be between {} and {}",
            MIN_VOTES_PER_VOTER, MAX_VOTES_PER_VOTER
        )));
    }
    Ok(value)
}

/// A ranking must be a non-empty partial permutation of the poll's nominations,
/// no longer than `votes_per_voter`.
pub fn rankings(poll: &Poll, rankings: &[NominationId]) -> PollResult<()> {
    if rankings.is_empty() {
        return Err(PollError::Validation(
            "rankings must contain at least one nomination".to_string(),
        ));
    }

    if rankings.len() > poll.votes_per_voter as usize {
        return Err(PollError::Validation(format!(
            "rankings may contain at most {} nominations",
            poll.votes_per_voter
        )));
    }

    let mut seen = HashSet::new();
    for nomination_id in rankings {
        if !seen.insert(nomination_id) {
            return Err(PollError::Validation(format!(
                "nomination {} is ranked more than once",
                nomination_id
            )));
        }
        if !poll.nominations.contains_key(nomination_id) {
            return Err(PollError::Validation(format!(
                "nomination {} does not exist",
                nomination_id
            )));
        }
    }

    Ok(())
}

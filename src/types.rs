use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PollId = String;
pub type ParticipantId = String;
pub type NominationId = String;

/// participant ID -> display name
pub type Participants = HashMap<ParticipantId, String>;
pub type Nominations = HashMap<NominationId, Nomination>;
/// participant ID -> ordered nomination IDs (most preferred first)
pub type Rankings = HashMap<ParticipantId, Vec<NominationId>>;
pub type Results = Vec<ResultEntry>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nomination {
    #[serde(rename = "userID")]
    pub user_id: ParticipantId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEntry {
    #[serde(rename = "nominationID")]
    pub nomination_id: NominationId,
    #[serde(rename = "nominationText")]
    pub nomination_text: String,
    pub score: f64,
}

/// Lifecycle state derived from the record's fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollPhase {
    Open,
    Voting,
    Closed,
}

/// The full poll record. This is also the snapshot pushed to every room member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub topic: String,
    pub votes_per_voter: u32,
    pub participants: Participants,
    #[serde(rename = "adminID")]
    pub admin_id: ParticipantId,
    pub nominations: Nominations,
    pub rankings: Rankings,
    /// Set exactly once, when the poll is closed.
    pub results: Option<Results>,
    pub has_started: bool,
}

impl Poll {
    /// Fresh poll in the Open phase. The admin is not yet a participant; they are
    /// added when their first realtime connection comes up.
    pub fn new(id: PollId, topic: String, votes_per_voter: u32, admin_id: ParticipantId) -> Self {
        Self {
            id,
            topic,
            votes_per_voter,
            participants: HashMap::new(),
            admin_id,
            nominations: HashMap::new(),
            rankings: HashMap::new(),
            results: None,
            has_started: false,
        }
    }

    pub fn phase(&self) -> PollPhase {
        if self.results.is_some() {
            PollPhase::Closed
        } else if self.has_started {
            PollPhase::Voting
        } else {
            PollPhase::Open
        }
    }
}

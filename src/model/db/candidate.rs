use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
///
/// A candidate is one user standing for one position in one election; the
/// `(user_id, election_id, position)` triple is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub user_id: Id,
    pub election_id: Id,
    pub position: String,
    pub motto: String,
    pub manifesto: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Id>,
    /// Number of votes received. Only ever incremented, by casting a vote.
    pub votes: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl CandidateCore {
    /// A fresh, unapproved application with no votes.
    pub fn new(
        user_id: Id,
        election_id: Id,
        position: String,
        motto: String,
        manifesto: String,
        photo: Option<String>,
    ) -> Self {
        Self {
            user_id,
            election_id,
            position,
            motto,
            manifesto,
            photo,
            is_approved: false,
            approved_by: None,
            votes: 0,
            created_at: Utc::now(),
        }
    }

    /// Can this candidate receive votes for the given election position?
    pub fn stands_for(&self, election_id: Id, position: &str) -> bool {
        self.election_id == election_id && self.position == position
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_candidates_start_empty() {
        let candidate = CandidateCore::example(Id::new(), Id::new(), "Captain");
        assert!(!candidate.is_approved);
        assert_eq!(candidate.approved_by, None);
        assert_eq!(candidate.votes, 0);
    }

    #[test]
    fn stands_for() {
        let election = Id::new();
        let candidate = CandidateCore::example(Id::new(), election, "Captain");
        assert!(candidate.stands_for(election, "Captain"));
        assert!(!candidate.stands_for(election, "Head Prefect"));
        assert!(!candidate.stands_for(Id::new(), "Captain"));
    }
}

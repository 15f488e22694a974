use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::vote::Vote};

/// A single vote to cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter_id: ApiId,
    pub candidate_id: ApiId,
    pub election_id: ApiId,
    pub position: String,
}

/// An accepted vote, as returned to the booth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    pub id: ApiId,
    pub voter_id: ApiId,
    pub candidate_id: ApiId,
    pub election_id: ApiId,
    pub position: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            voter_id: vote.vote.voter_id.into(),
            candidate_id: vote.vote.candidate_id.into(),
            election_id: vote.vote.election_id.into(),
            position: vote.vote.position,
            timestamp: vote.vote.timestamp,
        }
    }
}

/// How many votes have been cast in an election, across all positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub election_id: ApiId,
    pub total_votes: u64,
}

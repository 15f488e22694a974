use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, user::UserSummary},
    db::candidate::{Candidate, NewCandidate},
    mongodb::Id,
};

/// A user's application to stand for a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateApplication {
    pub election_id: ApiId,
    pub position: String,
    pub motto: String,
    pub manifesto: String,
    #[serde(default)]
    pub photo: Option<String>,
}

impl CandidateApplication {
    /// Build the candidacy to insert for the given applicant.
    pub fn into_candidate(self, user_id: Id) -> NewCandidate {
        NewCandidate::new(
            user_id,
            self.election_id.into(),
            self.position,
            self.motto,
            self.manifesto,
            self.photo,
        )
    }
}

/// An API-friendly candidate description, with the standing user and election
/// filled in where they could be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub user_id: ApiId,
    pub user: Option<UserSummary>,
    pub election_id: ApiId,
    pub election_title: Option<String>,
    pub position: String,
    pub motto: String,
    pub manifesto: String,
    pub photo: Option<String>,
    pub is_approved: bool,
    pub approved_by: Option<ApiId>,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
}

impl CandidateDescription {
    pub fn new(
        candidate: Candidate,
        user: Option<UserSummary>,
        election_title: Option<String>,
    ) -> Self {
        Self {
            id: candidate.id.into(),
            user_id: candidate.candidate.user_id.into(),
            user,
            election_id: candidate.candidate.election_id.into(),
            election_title,
            position: candidate.candidate.position,
            motto: candidate.candidate.motto,
            manifesto: candidate.candidate.manifesto,
            photo: candidate.candidate.photo,
            is_approved: candidate.candidate.is_approved,
            approved_by: candidate.candidate.approved_by.map(Into::into),
            votes: candidate.candidate.votes,
            created_at: candidate.candidate.created_at,
        }
    }
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self::new(candidate, None, None)
    }
}

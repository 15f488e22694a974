use std::collections::{BTreeMap, HashMap};

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::{candidate::Candidate, election::Election, user::User},
    mongodb::Id,
};

/// One candidate's standing in the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: ApiId,
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub class: Option<String>,
    pub photo: Option<String>,
    pub motto: String,
    pub votes: i64,
}

/// Results of an election.
///
/// `results` comes from the candidates' own counters and `vote_counts` from
/// counting vote records, read separately, so the two can briefly disagree
/// while votes are being cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    /// Approved candidates for each position, most votes first.
    pub results: BTreeMap<String, Vec<CandidateResult>>,
    /// Number of vote records for each position that has any.
    pub vote_counts: BTreeMap<String, u64>,
}

impl ElectionResults {
    /// Group approved candidates by position and rank them by votes.
    ///
    /// Every position of the election gets an entry, even with no candidates.
    /// Unapproved candidates are left out. Candidates with equal votes keep
    /// their given order.
    pub fn tabulate(
        election: &Election,
        candidates: Vec<Candidate>,
        users: &HashMap<Id, User>,
        vote_counts: impl IntoIterator<Item = (String, u64)>,
    ) -> Self {
        let mut results: BTreeMap<String, Vec<CandidateResult>> = election
            .positions
            .iter()
            .map(|position| (position.clone(), Vec::new()))
            .collect();

        let mut ranked = candidates
            .into_iter()
            .filter(|c| c.is_approved && c.election_id == election.id)
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));

        for candidate in ranked {
            let user = users.get(&candidate.user_id);
            results
                .entry(candidate.candidate.position.clone())
                .or_default()
                .push(CandidateResult {
                    id: candidate.id.into(),
                    name: user.map(|u| u.name.clone()),
                    student_id: user.map(|u| u.student_id.clone()),
                    class: user.map(|u| u.class.clone()),
                    photo: user.and_then(|u| u.photo.clone()),
                    motto: candidate.candidate.motto,
                    votes: candidate.candidate.votes,
                });
        }

        Self {
            election_id: election.id.into(),
            results,
            vote_counts: vote_counts.into_iter().collect(),
        }
    }
}

/// Read one `{ _id: <position>, count: <n> }` row of the per-position vote
/// grouping. Rows of any other shape are skipped.
pub fn position_count(row: &Document) -> Option<(String, u64)> {
    let position = row.get_str("_id").ok()?.to_string();
    let count = match row.get("count")? {
        Bson::Int32(n) => u64::try_from(*n).ok()?,
        Bson::Int64(n) => u64::try_from(*n).ok()?,
        _ => return None,
    };
    Some((position, count))
}

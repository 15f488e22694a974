use mongodb::bson::{doc, Document};
use rocket::{http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AnyUser, AuthToken},
            vote::{VoteCount, VoteDescription, VoteRequest},
        },
        db::{
            candidate::Candidate,
            election::Election,
            user::{User, VoterFlags},
            vote::{NewVote, Vote},
        },
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![post_vote, get_vote_count, get_voted_positions]
}

pub const DUPLICATE_VOTE: &str = "You have already voted for this position";

/// Cast a vote. Voters vote for themselves; an admin at a booth may vote on
/// behalf of any voter.
#[post("/votes", data = "<request>", format = "json")]
async fn post_vote(
    token: AuthToken<AnyUser>,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    new_votes: Coll<NewVote>,
) -> Result<(Status, Json<VoteDescription>)> {
    let voter_id: Id = request.voter_id.into();
    if voter_id != token.id && !token.is_admin() {
        return Err(Error::unauthorized("Cannot vote on behalf of another user"));
    }

    let ballot = Ballot {
        voter_id,
        candidate_id: request.candidate_id.into(),
        election_id: request.election_id.into(),
        position: &request.position,
    };
    // A repeat vote is reported as such, whatever else has changed since.
    ballot.reject_repeat(&votes).await?;
    ballot.check(&elections, &users, &candidates).await?;
    let vote = ballot.cast(&new_votes, &candidates, &users).await?;

    Ok((Status::Created, Json(vote.into())))
}

/// The total number of votes cast in an election.
#[get("/votes?<election_id>")]
async fn get_vote_count(election_id: Option<Id>, votes: Coll<Vote>) -> Result<Json<VoteCount>> {
    let election_id = election_id.ok_or_else(|| Error::bad_request("Election ID is required"))?;
    let total_votes = votes
        .count_documents(doc! { "election_id": election_id }, None)
        .await?;
    Ok(Json(VoteCount {
        election_id: election_id.into(),
        total_votes,
    }))
}

/// The positions the signed in user has already voted for in an election.
#[get("/elections/<election_id>/voted")]
async fn get_voted_positions(
    token: AuthToken<AnyUser>,
    election_id: Id,
    users: Coll<User>,
) -> Result<Json<Vec<String>>> {
    let user = users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.id)))?;
    Ok(Json(user.has_voted.positions_voted(election_id)))
}

/// One voter's choice for one position.
struct Ballot<'a> {
    voter_id: Id,
    candidate_id: Id,
    election_id: Id,
    position: &'a str,
}

impl Ballot<'_> {
    /// Fail with the duplicate-vote error if this voter has already voted for
    /// this position.
    async fn reject_repeat(&self, votes: &Coll<Vote>) -> Result<()> {
        let existing = doc! {
            "voter_id": self.voter_id,
            "election_id": self.election_id,
            "position": self.position,
        };
        match votes.find_one(existing, None).await? {
            Some(_) => Err(Error::bad_request(DUPLICATE_VOTE)),
            None => Ok(()),
        }
    }

    /// Check the ballot refers to an open election, an eligible voter and an
    /// approved candidate for the chosen position.
    async fn check(
        &self,
        elections: &Coll<Election>,
        users: &Coll<User>,
        candidates: &Coll<Candidate>,
    ) -> Result<()> {
        let election = elections
            .find_one(self.election_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", self.election_id)))?;
        if !election.is_active {
            return Err(Error::bad_request("Election is not active"));
        }
        if !election.has_position(self.position) {
            return Err(Error::bad_request(format!(
                "Election has no position '{}'",
                self.position
            )));
        }

        let voter = users
            .find_one(self.voter_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {}", self.voter_id)))?;
        if !election.is_eligible(&voter.class) {
            return Err(Error::bad_request(format!(
                "Class {} is not eligible to vote in this election",
                voter.class
            )));
        }

        let candidate = candidates
            .find_one(self.candidate_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {}", self.candidate_id)))?;
        if !candidate.stands_for(self.election_id, self.position) {
            return Err(Error::bad_request(
                "Candidate is not standing for this position",
            ));
        }
        if !candidate.is_approved {
            return Err(Error::bad_request("Candidate is not approved"));
        }

        Ok(())
    }

    /// Record the vote, then bump the candidate's counter and flag the voter.
    ///
    /// These are separate writes. Once the vote is inserted it stands, even if
    /// a later write fails.
    async fn cast(
        &self,
        new_votes: &Coll<NewVote>,
        candidates: &Coll<Candidate>,
        users: &Coll<User>,
    ) -> Result<Vote> {
        // The unique index rejects a concurrent second vote.
        let vote = NewVote::new(
            self.voter_id,
            self.candidate_id,
            self.election_id,
            self.position.to_string(),
        );
        let result = new_votes.insert_one(&vote, None).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                Error::bad_request(DUPLICATE_VOTE)
            } else {
                e.into()
            }
        })?;
        let vote = Vote {
            id: inserted_id(&result.inserted_id)?,
            vote,
        };

        candidates
            .update_one(
                self.candidate_id.as_doc(),
                doc! { "$inc": { "votes": 1 } },
                None,
            )
            .await
            .map_err(|e| {
                error!(
                    "Vote {} recorded but candidate {} not counted: {e}",
                    vote.id, self.candidate_id
                );
                e
            })?;

        let mut flag = Document::new();
        flag.insert(VoterFlags::field_path(self.election_id, self.position), true);
        users
            .update_one(self.voter_id.as_doc(), doc! { "$set": flag }, None)
            .await
            .map_err(|e| {
                error!(
                    "Vote {} recorded but voter {} not flagged: {e}",
                    vote.id, self.voter_id
                );
                e
            })?;

        info!(
            "Vote {} cast in election {} for '{}'",
            vote.id, self.election_id, self.position
        );
        Ok(vote)
    }
}

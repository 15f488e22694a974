use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::results::{position_count, ElectionResults},
        db::{candidate::Candidate, election::Election, user::User, vote::Vote},
        mongodb::{Coll, Id},
    },
};

use super::users::users_by_id;

pub fn routes() -> Vec<Route> {
    routes![get_results]
}

/// Tally an election: each approved candidate's counter, grouped by position,
/// alongside the number of vote records per position.
#[get("/results/<election_id>")]
async fn get_results(
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    users: Coll<User>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let by_position_then_votes = FindOptions::builder()
        .sort(doc! { "position": 1, "votes": -1 })
        .build();
    let standing: Vec<Candidate> = candidates
        .find(
            doc! { "election_id": election_id, "is_approved": true },
            by_position_then_votes,
        )
        .await?
        .try_collect()
        .await?;
    let standing_users = users_by_id(&users, standing.iter().map(|c| c.user_id)).await?;

    let pipeline = vec![
        doc! { "$match": { "election_id": election_id } },
        doc! { "$group": { "_id": "$position", "count": { "$sum": 1 } } },
    ];
    let counts: Vec<(String, u64)> = votes
        .aggregate(pipeline, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?
        .iter()
        .filter_map(position_count)
        .collect();

    Ok(Json(ElectionResults::tabulate(
        &election,
        standing,
        &standing_users,
        counts,
    )))
}

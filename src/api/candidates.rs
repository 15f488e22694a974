use std::collections::HashMap;

use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AnyUser, AuthToken},
            candidate::{CandidateApplication, CandidateDescription},
            user::UserSummary,
        },
        db::{
            candidate::{Candidate, NewCandidate},
            election::Election,
            user::User,
        },
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
};

use super::users::users_by_id;

pub fn routes() -> Vec<Route> {
    routes![get_candidates, apply, toggle_approval]
}

pub const DUPLICATE_APPLICATION: &str = "You have already applied for this position";

#[get("/candidates?<election_id>")]
async fn get_candidates(
    election_id: Option<Id>,
    candidates: Coll<Candidate>,
    users: Coll<User>,
    elections: Coll<Election>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let filter = election_id.map(|id| doc! { "election_id": id });
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let found: Vec<Candidate> = candidates
        .find(filter, newest_first)
        .await?
        .try_collect()
        .await?;

    // Fill in the standing users and election titles.
    let standing = users_by_id(&users, found.iter().map(|c| c.user_id)).await?;
    let election_ids = found.iter().map(|c| c.election_id).collect::<Vec<_>>();
    let titles: HashMap<Id, String> = elections
        .find(doc! { "_id": { "$in": election_ids } }, None)
        .await?
        .map_ok(|election| (election.id, election.election.title))
        .try_collect()
        .await?;

    let described = found
        .into_iter()
        .map(|candidate| {
            let user = standing.get(&candidate.user_id).map(UserSummary::from);
            let title = titles.get(&candidate.election_id).cloned();
            CandidateDescription::new(candidate, user, title)
        })
        .collect();
    Ok(Json(described))
}

/// Stand for a position. The applicant is whoever is signed in.
#[post("/candidates", data = "<application>", format = "json")]
async fn apply(
    token: AuthToken<AnyUser>,
    application: Json<CandidateApplication>,
    elections: Coll<Election>,
    new_candidates: Coll<NewCandidate>,
) -> Result<(Status, Json<CandidateDescription>)> {
    let election_id: Id = application.election_id.into();
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    if !election.has_position(&application.position) {
        return Err(Error::bad_request(format!(
            "Election {election_id} has no position '{}'",
            application.position
        )));
    }

    // Check for an existing application.
    let existing = doc! {
        "user_id": token.id,
        "election_id": election_id,
        "position": application.position.as_str(),
    };
    if new_candidates.find_one(existing, None).await?.is_some() {
        return Err(Error::bad_request(DUPLICATE_APPLICATION));
    }

    // The unique index catches a racing duplicate.
    let candidate = application.0.into_candidate(token.id);
    let result = new_candidates
        .insert_one(&candidate, None)
        .await
        .map_err(|e| {
            if is_duplicate_key_error(&e) {
                Error::bad_request(DUPLICATE_APPLICATION)
            } else {
                e.into()
            }
        })?;
    let candidate = Candidate {
        id: inserted_id(&result.inserted_id)?,
        candidate,
    };
    info!(
        "User {} applied for '{}' in election {}",
        token.id, candidate.position, election_id
    );

    Ok((Status::Created, Json(candidate.into())))
}

/// Approve or unapprove a candidate, recording who did it.
#[put("/candidates/<candidate_id>/approve")]
async fn toggle_approval(
    token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let flip: Vec<Document> = vec![doc! {
        "$set": {
            "is_approved": { "$not": ["$is_approved"] },
            "approved_by": token.id,
        }
    }];
    let return_updated = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let candidate = candidates
        .find_one_and_update(candidate_id.as_doc(), flip, return_updated)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;

    info!(
        "Candidate {} {} by {}",
        candidate.id,
        if candidate.is_approved { "approved" } else { "unapproved" },
        token.id
    );
    Ok(Json(candidate.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::db::{election::NewElection, user::NewUser};

    use super::*;

    async fn insert<T>(coll: &Coll<T>, item: T) -> Id
    where
        T: serde::Serialize,
    {
        inserted_id(&coll.insert_one(item, None).await.unwrap().inserted_id).unwrap()
    }

    #[backend_test(voter)]
    async fn apply_once(
        client: Client,
        new_elections: Coll<NewElection>,
        candidates: Coll<Candidate>,
    ) {
        let election_id = insert(&new_elections, NewElection::example(Id::new())).await;

        let application = CandidateApplication::example(election_id, "Head Prefect");
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(application).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let created: CandidateDescription = response.into_json().await.unwrap();
        assert!(!created.is_approved);
        assert_eq!(created.votes, 0);

        // Applying again for the same position is refused.
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(application).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);

        // A different position is fine.
        let other = CandidateApplication::example(election_id, "Sports Captain");
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(other).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 2);
    }

    #[backend_test(voter)]
    async fn apply_unknown_position(client: Client, new_elections: Coll<NewElection>) {
        let election_id = insert(&new_elections, NewElection::example(Id::new())).await;

        let application = CandidateApplication::example(election_id, "Emperor");
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(application).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let application = CandidateApplication::example(Id::new(), "Head Prefect");
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(application).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn apply_requires_sign_in(client: Client) {
        let application = CandidateApplication::example(Id::new(), "Head Prefect");
        let response = client
            .post(uri!(apply))
            .header(ContentType::JSON)
            .body(json!(application).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn approval_toggles(client: Client, new_candidates: Coll<NewCandidate>) {
        let id = insert(
            &new_candidates,
            NewCandidate::example(Id::new(), Id::new(), "Head Prefect"),
        )
        .await;

        let response = client.put(uri!(toggle_approval(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let approved: CandidateDescription = response.into_json().await.unwrap();
        assert!(approved.is_approved);
        assert!(approved.approved_by.is_some());

        let response = client.put(uri!(toggle_approval(id))).dispatch().await;
        let unapproved: CandidateDescription = response.into_json().await.unwrap();
        assert!(!unapproved.is_approved);

        let response = client
            .put(uri!(toggle_approval(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn list_with_details(
        client: Client,
        new_users: Coll<NewUser>,
        new_elections: Coll<NewElection>,
        new_candidates: Coll<NewCandidate>,
    ) {
        let user_id = insert(&new_users, NewUser::example_candidate()).await;
        let election_id = insert(&new_elections, NewElection::example(Id::new())).await;
        let other_election_id = insert(&new_elections, NewElection::example(Id::new())).await;
        insert(
            &new_candidates,
            NewCandidate::example(user_id, election_id, "Head Prefect"),
        )
        .await;
        insert(
            &new_candidates,
            NewCandidate::example(user_id, other_election_id, "Head Prefect"),
        )
        .await;

        let response = client
            .get(uri!(get_candidates(Some(election_id))))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<CandidateDescription> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(*listed[0].election_id, election_id);
        assert_eq!(
            listed[0].user.as_ref().unwrap().name,
            NewUser::example_candidate().name
        );
        assert_eq!(
            listed[0].election_title.as_deref(),
            Some(NewElection::example(Id::new()).title.as_str())
        );

        let response = client
            .get(uri!(get_candidates(_)))
            .dispatch()
            .await;
        let listed: Vec<CandidateDescription> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}

use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            election::{ElectionDescription, ElectionSpec},
        },
        db::{
            election::{Election, NewElection},
            user::User,
        },
        mongodb::{inserted_id, Coll, Id},
    },
};

use super::users::users_by_id;

pub fn routes() -> Vec<Route> {
    routes![get_elections, get_election, create_election, toggle_election]
}

#[get("/elections")]
async fn get_elections(
    elections: Coll<Election>,
    users: Coll<User>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();
    let all: Vec<Election> = elections
        .find(None, newest_first)
        .await?
        .try_collect()
        .await?;
    Ok(Json(describe(all, &users).await?))
}

#[get("/elections/<election_id>")]
async fn get_election(
    election_id: Id,
    elections: Coll<Election>,
    users: Coll<User>,
) -> Result<Json<ElectionDescription>> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    let mut described = describe(vec![election], &users).await?;
    // Exactly one election went in.
    Ok(Json(described.remove(0)))
}

/// Describe elections, filling in their creators' names.
async fn describe(
    elections: Vec<Election>,
    users: &Coll<User>,
) -> Result<Vec<ElectionDescription>> {
    let creators = users_by_id(users, elections.iter().map(|e| e.created_by)).await?;
    let described = elections
        .into_iter()
        .map(|election| {
            let name = creators.get(&election.created_by).map(|u| u.name.clone());
            ElectionDescription::new(election, name)
        })
        .collect();
    Ok(described)
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    users: Coll<User>,
) -> Result<(Status, Json<ElectionDescription>)> {
    spec.validate().map_err(Error::bad_request)?;

    let election = spec.0.into_election(token.id);
    let result = new_elections.insert_one(&election, None).await?;
    let election = Election {
        id: inserted_id(&result.inserted_id)?,
        election,
    };
    info!("Election '{}' ({}) created", election.title, election.id);

    let mut described = describe(vec![election], &users).await?;
    Ok((Status::Created, Json(described.remove(0))))
}

/// Open or close voting. The flag is flipped in a single update, so two
/// toggles always restore the original state.
#[put("/elections/<election_id>/toggle")]
async fn toggle_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    users: Coll<User>,
) -> Result<Json<ElectionDescription>> {
    let flip = vec![doc! {
        "$set": {
            "is_active": { "$not": ["$is_active"] },
            "updated_at": BsonDateTime::now(),
        }
    }];
    let return_updated = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let election = elections
        .find_one_and_update(election_id.as_doc(), flip, return_updated)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    info!(
        "Election {} is now {}",
        election.id,
        if election.is_active { "active" } else { "inactive" }
    );
    let mut described = describe(vec![election], &users).await?;
    Ok(Json(described.remove(0)))
}

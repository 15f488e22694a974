use std::collections::HashMap;

use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AnyUser, AuthToken},
            user::{validate_bulk_voters, BulkVoter, ImportSummary, RegisterRequest, UserDescription},
        },
        db::user::{NewUser, User},
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, import_voters, get_voters, get_user]
}

const DUPLICATE_STUDENT_ID: &str = "Student ID already exists";

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    _token: AuthToken<Admin>,
    request: Json<RegisterRequest>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<(Status, Json<UserDescription>)> {
    request.validate().map_err(Error::bad_request)?;

    // Check student ID uniqueness.
    let with_student_id = doc! {
        "student_id": request.student_id.as_str(),
    };
    if new_users.find_one(with_student_id, None).await?.is_some() {
        return Err(Error::bad_request(DUPLICATE_STUDENT_ID));
    }

    // Create and insert the user. The unique index catches a racing duplicate.
    let user = request.0.into_user(config.default_password())?;
    let result = new_users.insert_one(&user, None).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            Error::bad_request(DUPLICATE_STUDENT_ID)
        } else {
            e.into()
        }
    })?;
    let user = User {
        id: inserted_id(&result.inserted_id)?,
        user,
    };
    info!("Registered {} {} ({})", user.role, user.student_id, user.id);

    Ok((Status::Created, Json(user.into())))
}

#[post("/voters/bulk", data = "<voters>", format = "json")]
async fn import_voters(
    _token: AuthToken<Admin>,
    voters: Json<Vec<BulkVoter>>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<(Status, Json<ImportSummary>)> {
    validate_bulk_voters(&voters).map_err(Error::bad_request)?;

    // Reject the whole batch if any student ID is already taken.
    let student_ids = voters
        .iter()
        .map(|voter| voter.student_id.as_str())
        .collect::<Vec<_>>();
    let taken = new_users
        .find(doc! { "student_id": { "$in": student_ids } }, None)
        .await?
        .map_ok(|user| user.student_id)
        .try_collect::<Vec<_>>()
        .await?;
    if !taken.is_empty() {
        return Err(Error::bad_request(format!(
            "Student IDs already exist: {}",
            taken.join(", ")
        )));
    }

    let new_voters = voters
        .0
        .into_iter()
        .map(|voter| voter.into_user(config.default_password()))
        .collect::<Result<Vec<_>>>()?;
    let result = new_users
        .insert_many(&new_voters, None)
        .await
        .map_err(|e| {
            if is_duplicate_key_error(&e) {
                Error::bad_request("Student IDs already exist")
            } else {
                e.into()
            }
        })?;
    let inserted = result.inserted_ids.len();
    info!("Imported {inserted} voters");

    Ok((Status::Created, Json(ImportSummary { inserted })))
}

#[get("/voters")]
async fn get_voters(
    _token: AuthToken<Admin>,
    users: Coll<User>,
) -> Result<Json<Vec<UserDescription>>> {
    let by_student_id = FindOptions::builder()
        .sort(doc! { "student_id": 1 })
        .build();
    let voters: Vec<UserDescription> = users
        .find(doc! { "role": "voter" }, by_student_id)
        .await?
        .map_ok(UserDescription::from)
        .try_collect()
        .await?;
    Ok(Json(voters))
}

/// Look a user up by database ID, or failing that, by student ID.
#[get("/users/<id>")]
async fn get_user(
    _token: AuthToken<AnyUser>,
    id: &str,
    users: Coll<User>,
) -> Result<Json<UserDescription>> {
    let by_id = match id.parse::<Id>() {
        Ok(db_id) => users.find_one(db_id.as_doc(), None).await?,
        Err(_) => None,
    };
    let user = match by_id {
        Some(user) => user,
        None => users
            .find_one(doc! { "student_id": id }, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("User {id}")))?,
    };
    Ok(Json(user.into()))
}

/// Fetch the users with the given IDs, keyed by ID. Missing users are skipped.
pub(crate) async fn users_by_id(
    users: &Coll<User>,
    ids: impl IntoIterator<Item = Id>,
) -> Result<HashMap<Id, User>> {
    let ids = ids.into_iter().collect::<Vec<_>>();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let found: HashMap<Id, User> = users
        .find(doc! { "_id": { "$in": ids } }, None)
        .await?
        .map_ok(|user| (user.id, user))
        .try_collect()
        .await?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::db::user::Role;

    use super::*;

    #[backend_test(admin)]
    async fn register_user(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(RegisterRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let description: UserDescription = response.into_json().await.unwrap();
        assert_eq!(description.student_id, RegisterRequest::example().student_id);
        assert_eq!(description.role, Role::Voter);

        let user = users
            .find_one(description.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, RegisterRequest::example().name);
        assert!(!user.is_approved);

        // The same student ID again is refused.
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(RegisterRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let count = users
            .count_documents(doc! { "student_id": RegisterRequest::example().student_id }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test(voter)]
    async fn register_requires_admin(client: Client) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(RegisterRequest::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn bulk_import(client: Client, users: Coll<User>) {
        let batch = vec![BulkVoter::example("B1"), BulkVoter::example("B2")];
        let response = client
            .post(uri!(import_voters))
            .header(ContentType::JSON)
            .body(json!(batch).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let summary: ImportSummary = response.into_json().await.unwrap();
        assert_eq!(summary.inserted, 2);

        let imported = users
            .count_documents(doc! { "role": "voter", "is_approved": true }, None)
            .await
            .unwrap();
        assert_eq!(imported, 2);

        // A batch overlapping existing voters is refused as a whole.
        let batch = vec![BulkVoter::example("B3"), BulkVoter::example("B1")];
        let response = client
            .post(uri!(import_voters))
            .header(ContentType::JSON)
            .body(json!(batch).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let total = users
            .count_documents(doc! { "role": "voter" }, None)
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[backend_test(admin)]
    async fn list_voters(client: Client, new_users: Coll<NewUser>) {
        new_users
            .insert_many(vec![NewUser::example_voter2(), NewUser::example_candidate()], None)
            .await
            .unwrap();

        let response = client.get(uri!(get_voters)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let voters: Vec<UserDescription> = response.into_json().await.unwrap();
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].student_id, NewUser::example_voter2().student_id);
        assert_eq!(voters[0].role, Role::Voter);
    }

    #[backend_test(admin)]
    async fn find_user_by_either_id(client: Client, new_users: Coll<NewUser>) {
        let voter = NewUser::example_voter2();
        let id = inserted_id(
            &new_users
                .insert_one(&voter, None)
                .await
                .unwrap()
                .inserted_id,
        )
        .unwrap();

        let hex = id.to_hex();
        let response = client.get(uri!(get_user(hex.as_str()))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let by_id: UserDescription = response.into_json().await.unwrap();
        assert_eq!(by_id.student_id, voter.student_id);

        let response = client
            .get(uri!(get_user(voter.student_id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let by_student_id: UserDescription = response.into_json().await.unwrap();
        assert_eq!(*by_student_id.id, id);

        let response = client.get(uri!(get_user("NOBODY"))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}

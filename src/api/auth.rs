use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AnyUser, AuthToken, LoginRequest, AUTH_TOKEN_COOKIE},
            user::UserDescription,
        },
        db::user::User,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![login, logout, me]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let with_student_id = doc! {
        "student_id": credentials.student_id.as_str(),
    };

    let user = users
        .find_one(with_student_id, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| Error::unauthorized("Invalid student ID or password"))?;

    let token = AuthToken::<AnyUser>::new(&user);
    cookies.add(token.into_cookie(config)?);
    info!("{} signed in as {}", user.student_id, user.role);

    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/auth/me")]
pub async fn me(token: AuthToken<AnyUser>, users: Coll<User>) -> Result<Json<UserDescription>> {
    let user = users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.id)))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::db::user::{examples::EXAMPLE_PASSWORD, NewUser, Role};

    use super::*;

    #[backend_test]
    async fn login_valid(client: Client, users: Coll<NewUser>) {
        users.insert_one(NewUser::example_voter(), None).await.unwrap();

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(LoginRequest::example_voter()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let user: UserDescription = response.into_json().await.unwrap();
        assert_eq!(user.student_id, NewUser::example_voter().student_id);
        assert_eq!(user.role, Role::Voter);
    }

    #[backend_test]
    async fn login_invalid(client: Client, users: Coll<NewUser>) {
        users.insert_one(NewUser::example_voter(), None).await.unwrap();

        // Wrong password.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "student_id": NewUser::example_voter().student_id,
                    "password": "not the password",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Unknown student.
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "student_id": "NOBODY",
                    "password": EXAMPLE_PASSWORD,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(voter)]
    async fn me_signed_in(client: Client) {
        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let user: UserDescription = response.into_json().await.unwrap();
        assert_eq!(user.student_id, NewUser::example_voter().student_id);
    }

    #[backend_test]
    async fn me_signed_out(client: Client) {
        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}

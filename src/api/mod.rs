use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorMessage;

mod auth;
mod candidates;
mod elections;
mod results;
mod users;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(users::routes());
    routes.extend(elections::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Give guard and parsing failures the same JSON shape as handler errors.
/// Malformed bodies are reported as bad requests rather than 422.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorMessage>) {
    let status = match status {
        Status::UnprocessableEntity => Status::BadRequest,
        other => other,
    };
    let message = status.reason().unwrap_or("Unknown error");
    (status, Json(ErrorMessage::new(message)))
}

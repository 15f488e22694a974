use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::user::{Role, User},
    mongodb::{Coll, Id},
};

use super::rights::Access;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token for a specific user, usable as a request guard that
/// demands the access level `A`.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<A> {
    pub id: Id,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<A>,
}

impl<A> AuthToken<A> {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            phantom: PhantomData,
        }
    }

    /// Is this token for an admin?
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<A>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<A> {
    #[serde(flatten, bound = "")]
    token: AuthToken<A>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, A> FromRequest<'r> for AuthToken<A>
where
    A: Access,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check that the user it names
    /// still exists and currently has access level `A`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Not signed in"),
                ))
            }
        };

        let mut token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Invalid or expired session"),
                ));
            }
        };

        // Check the user still exists, and use their current role rather than
        // whatever it was when the token was issued.
        let users = req.guard::<Coll<User>>().await.unwrap();
        let user = match users.find_one(token.id.as_doc(), None).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Account no longer exists"),
                ))
            }
            Err(e) => return Outcome::Failure((Status::InternalServerError, e.into())),
        };
        token.role = user.role;

        if !A::permits(token.role) {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::unauthorized(format!("Requires {} access", A::NAME)),
            ));
        }

        Outcome::Success(token)
    }
}

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Candidate,
    #[default]
    Voter,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Admin => "admin",
            Self::Candidate => "candidate",
            Self::Voter => "voter",
        };
        write!(f, "{name}")
    }
}

/// Which positions of which elections a user has already voted for.
///
/// Stored as `{ <election id hex>: { <position>: true } }`, so that a single
/// vote can be recorded with one `$set` on [`VoterFlags::field_path`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterFlags(BTreeMap<String, BTreeMap<String, bool>>);

impl VoterFlags {
    /// Has this user voted for the given position in the given election?
    pub fn has_voted(&self, election_id: Id, position: &str) -> bool {
        self.0
            .get(&election_id.to_hex())
            .and_then(|positions| positions.get(position))
            .copied()
            .unwrap_or(false)
    }

    /// Record a vote locally. The database is updated separately.
    #[cfg(test)]
    pub fn mark_voted(&mut self, election_id: Id, position: &str) {
        self.0
            .entry(election_id.to_hex())
            .or_default()
            .insert(position.to_string(), true);
    }

    /// The positions voted for in the given election.
    pub fn positions_voted(&self, election_id: Id) -> Vec<String> {
        self.0
            .get(&election_id.to_hex())
            .map(|positions| {
                positions
                    .iter()
                    .filter(|(_, voted)| **voted)
                    .map(|(position, _)| position.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The dotted field path of the flag for one election position, relative to the user document.
    pub fn field_path(election_id: Id, position: &str) -> String {
        format!("has_voted.{}.{}", election_id.to_hex(), position)
    }
}

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    /// School-issued identifier, unique across all users.
    pub student_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub is_approved: bool,
    #[serde(default)]
    pub has_voted: VoterFlags,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a new user, hashing the given plaintext password.
    ///
    /// Admins are approved immediately; everyone else starts unapproved unless
    /// the caller says otherwise.
    pub fn new(
        student_id: String,
        name: String,
        role: Role,
        class: String,
        section: Option<String>,
        password: &str,
    ) -> Result<Self> {
        Ok(Self {
            student_id,
            name,
            email: None,
            password_hash: hash_password(password)?,
            role,
            class,
            section,
            photo: None,
            is_approved: role == Role::Admin,
            has_voted: VoterFlags::default(),
            created_at: Utc::now(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed stored hash can never match anything.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Argon2Config::default(),
    )?)
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Ensure at least one admin exists, creating one with the given credentials if not.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(
    users: &Coll<NewUser>,
    student_id: &str,
    password: &str,
) -> Result<()> {
    let admin_count = users
        .count_documents(doc! { "role": "admin" }, None)
        .await?;
    if admin_count == 0 {
        warn!("No admin account found, creating '{student_id}'");
        let admin = NewUser::new(
            student_id.to_string(),
            "Administrator".to_string(),
            Role::Admin,
            "staff".to_string(),
            None,
            password,
        )?;
        users.insert_one(admin, None).await?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voter_flags() {
        let election = Id::new();
        let other = Id::new();
        let mut flags = VoterFlags::default();
        assert!(!flags.has_voted(election, "Head Girl"));

        flags.mark_voted(election, "Head Girl");
        assert!(flags.has_voted(election, "Head Girl"));
        assert!(!flags.has_voted(election, "Head Boy"));
        assert!(!flags.has_voted(other, "Head Girl"));
        assert_eq!(flags.positions_voted(election), vec!["Head Girl".to_string()]);
        assert!(flags.positions_voted(other).is_empty());
    }

    #[test]
    fn voter_flag_path() {
        let election = Id::new();
        assert_eq!(
            VoterFlags::field_path(election, "Captain"),
            format!("has_voted.{}.Captain", election.to_hex())
        );
    }

    #[test]
    fn password_verification() {
        let user = UserCore::example_voter();
        assert!(user.verify_password(examples::EXAMPLE_PASSWORD));
        assert!(!user.verify_password("wrong"));
        assert_ne!(user.password_hash, examples::EXAMPLE_PASSWORD);
    }

    #[test]
    fn admins_start_approved() {
        assert!(UserCore::example_admin().is_approved);
        let voter = UserCore::new(
            "S1".to_string(),
            "Sam".to_string(),
            Role::Voter,
            "9C".to_string(),
            None,
            "password",
        )
        .unwrap();
        assert!(!voter.is_approved);
    }

    #[test]
    fn stored_flags_round_trip_through_bson() {
        let election = Id::new();
        let mut user = UserCore::example_voter();
        user.has_voted.mark_voted(election, "Captain");
        let doc = mongodb::bson::to_document(&user).unwrap();
        let back: UserCore = mongodb::bson::from_document(doc).unwrap();
        assert!(back.has_voted.has_voted(election, "Captain"));
    }
}

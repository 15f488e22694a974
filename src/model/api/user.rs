use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    api::id::ApiId,
    db::user::{NewUser, Role, User, VoterFlags},
};

/// A user as returned by the API: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: ApiId,
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub class: String,
    pub section: Option<String>,
    pub photo: Option<String>,
    pub is_approved: bool,
    pub has_voted: VoterFlags,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            student_id: user.user.student_id,
            name: user.user.name,
            email: user.user.email,
            role: user.user.role,
            class: user.user.class,
            section: user.user.section,
            photo: user.user.photo,
            is_approved: user.user.is_approved,
            has_voted: user.user.has_voted,
            created_at: user.user.created_at,
        }
    }
}

/// The public face of a user, as shown next to their candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: ApiId,
    pub name: String,
    pub student_id: String,
    pub class: String,
    pub photo: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            name: user.name.clone(),
            student_id: user.student_id.clone(),
            class: user.class.clone(),
            photo: user.photo.clone(),
        }
    }
}

/// A request to create one user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub class: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Falls back to the configured default password.
    #[serde(default)]
    pub password: Option<String>,
}

impl RegisterRequest {
    /// Check the required fields are filled in.
    pub fn validate(&self) -> std::result::Result<(), String> {
        require_filled(&self.student_id, &self.name, &self.class)
    }

    /// Build the user to insert, hashing the password.
    pub fn into_user(self, default_password: &str) -> Result<NewUser> {
        let password = self.password.as_deref().unwrap_or(default_password);
        let mut user = NewUser::new(
            self.student_id,
            self.name,
            self.role,
            self.class,
            self.section,
            password,
        )?;
        user.email = self.email;
        Ok(user)
    }
}

/// One parsed row of a bulk voter import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkVoter {
    pub student_id: String,
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl BulkVoter {
    /// Build the user to insert. Imported voters are approved straight away.
    pub fn into_user(self, default_password: &str) -> Result<NewUser> {
        let password = self.password.as_deref().unwrap_or(default_password);
        let mut user = NewUser::new(
            self.student_id,
            self.name,
            Role::Voter,
            self.class,
            self.section,
            password,
        )?;
        user.is_approved = true;
        Ok(user)
    }
}

/// Outcome of a bulk voter import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
}

/// Check a bulk import is non-empty, complete, and free of repeated student IDs.
pub fn validate_bulk_voters(voters: &[BulkVoter]) -> std::result::Result<(), String> {
    if voters.is_empty() {
        return Err("No voters to import".to_string());
    }
    let mut seen = HashSet::new();
    for (row, voter) in voters.iter().enumerate() {
        require_filled(&voter.student_id, &voter.name, &voter.class)
            .map_err(|e| format!("Row {}: {e}", row + 1))?;
        if !seen.insert(voter.student_id.as_str()) {
            return Err(format!(
                "Row {}: student ID '{}' appears more than once",
                row + 1,
                voter.student_id
            ));
        }
    }
    Ok(())
}

fn require_filled(student_id: &str, name: &str, class: &str) -> std::result::Result<(), String> {
    for (field, value) in [("student_id", student_id), ("name", name), ("class", class)] {
        if value.trim().is_empty() {
            return Err(format!("'{field}' must not be empty"));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;

    use super::*;
    use crate::model::mongodb::Id;

    #[test]
    fn description_hides_password() {
        let user = User {
            id: Id::from(ObjectId::new()),
            user: NewUser::example_voter(),
        };
        let json = rocket::serde::json::serde_json::to_value(UserDescription::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "voter");
    }

    #[test]
    fn register_defaults() {
        let request: RegisterRequest = rocket::serde::json::serde_json::from_str(
            r#"{"student_id": "S9", "name": "Nia", "class": "8B"}"#,
        )
        .unwrap();
        assert_eq!(request.role, Role::Voter);
        assert!(request.validate().is_ok());

        let user = request.into_user("fallback password").unwrap();
        assert!(user.verify_password("fallback password"));
        assert!(!user.is_approved);
    }

    #[test]
    fn register_rejects_blanks() {
        let mut request = RegisterRequest::example();
        request.class = " ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn bulk_validation() {
        assert!(validate_bulk_voters(&[]).is_err());
        assert!(validate_bulk_voters(&[BulkVoter::example("A1"), BulkVoter::example("A2")]).is_ok());
        assert!(
            validate_bulk_voters(&[BulkVoter::example("A1"), BulkVoter::example("A1")]).is_err()
        );

        let mut blank = BulkVoter::example("A3");
        blank.name.clear();
        assert!(validate_bulk_voters(&[blank]).is_err());
    }

    #[test]
    fn bulk_voters_are_approved_voters() {
        let mut row = BulkVoter::example("A1");
        row.password = Some("own password".to_string());
        let user = row.into_user("fallback").unwrap();
        assert_eq!(user.role, Role::Voter);
        assert!(user.is_approved);
        assert!(user.verify_password("own password"));
    }
}

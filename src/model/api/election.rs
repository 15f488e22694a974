use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::election::{validate_positions, Election, NewElection},
    mongodb::Id,
};

/// An election as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    pub positions: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub eligible_classes: Vec<String>,
}

impl ElectionSpec {
    /// Check the spec describes a usable election.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Election title must not be empty".to_string());
        }
        if self.start_time > self.end_time {
            return Err("Election cannot end before it starts".to_string());
        }
        validate_positions(&self.positions)
    }

    /// Build the election to insert. New elections are inactive until toggled.
    pub fn into_election(self, created_by: Id) -> NewElection {
        let now = Utc::now();
        NewElection {
            title: self.title,
            description: self.description,
            positions: self.positions,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: false,
            created_by,
            eligible_classes: self.eligible_classes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub positions: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_by: ApiId,
    /// Name of the admin who created the election, if they still exist.
    pub created_by_name: Option<String>,
    pub eligible_classes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ElectionDescription {
    pub fn new(election: Election, created_by_name: Option<String>) -> Self {
        Self {
            id: election.id.into(),
            title: election.election.title,
            description: election.election.description,
            positions: election.election.positions,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            is_active: election.election.is_active,
            created_by: election.election.created_by.into(),
            created_by_name,
            eligible_classes: election.election.eligible_classes,
            created_at: election.election.created_at,
            updated_at: election.election.updated_at,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self::new(election, None)
    }
}

#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionSpec {
        pub fn example() -> Self {
            let now = Utc::now();
            Self {
                title: "Prefect Elections".to_string(),
                description: "Choose next year's prefects".to_string(),
                positions: vec!["Head Prefect".to_string(), "Deputy Prefect".to_string()],
                start_time: now,
                end_time: now + Duration::days(2),
                eligible_classes: vec!["10A".to_string()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn valid_spec() {
        assert!(ElectionSpec::example().validate().is_ok());
    }

    #[test]
    fn invalid_specs() {
        let mut spec = ElectionSpec::example();
        spec.positions.clear();
        assert!(spec.validate().is_err());

        let mut spec = ElectionSpec::example();
        spec.end_time = spec.start_time - Duration::hours(1);
        assert!(spec.validate().is_err());

        let mut spec = ElectionSpec::example();
        spec.title = "".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn new_elections_are_inactive() {
        let creator = Id::new();
        let election = ElectionSpec::example().into_election(creator);
        assert!(!election.is_active);
        assert_eq!(election.created_by, creator);
        assert_eq!(election.positions.len(), 2);
    }
}
